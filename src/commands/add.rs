use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use colored::*;

use pattern_expert::config::ExpertConfig;
use pattern_expert::Pattern;

use super::open_search;

/// Pattern fields collected from the command line
pub struct AddInput {
    pub file: Option<PathBuf>,
    pub name: Option<String>,
    pub solution: Option<String>,
    pub id: Option<String>,
    pub description: Option<String>,
    pub problem: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub origin_query: Option<String>,
}

impl AddInput {
    fn into_pattern(self) -> Result<Pattern> {
        let mut pattern = match &self.file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str::<Pattern>(&raw)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => match (self.name, self.solution) {
                (Some(name), Some(solution)) => Pattern::new(name, solution),
                _ => bail!("either --file or both --name and --solution are required"),
            },
        };

        if let Some(id) = self.id {
            pattern.id = Some(id);
        }
        if let Some(description) = self.description {
            pattern.description = description;
        }
        if let Some(problem) = self.problem {
            pattern.problem = problem;
        }
        if let Some(category) = self.category {
            pattern.category = Some(category);
        }
        if !self.tags.is_empty() {
            pattern.tags = self.tags;
        }
        if let Some(query) = self.origin_query {
            pattern.origin_query = Some(query);
        }
        if pattern.origin.is_none() {
            pattern.origin = Some("cli".to_string());
        }
        Ok(pattern)
    }
}

pub fn run(config: &ExpertConfig, input: AddInput, json: bool) -> Result<()> {
    let pattern = input.into_pattern()?;
    let engine = open_search(config)?;
    let id = engine.add_pattern(pattern)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "id": id, "domain": config.domain, "count": engine.store().count() })
        );
    } else {
        println!("{} Added {} to {}", "✓".green(), id.cyan(), config.domain);
        println!(
            "  {} Run {} to embed it",
            "→".dimmed(),
            "expert index".cyan()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> AddInput {
        AddInput {
            file: None,
            name: Some("XOR".to_string()),
            solution: Some("toggle".to_string()),
            id: None,
            description: None,
            problem: None,
            category: Some("bitwise".to_string()),
            tags: vec!["bits".to_string()],
            origin_query: None,
        }
    }

    #[test]
    fn test_flags_build_pattern() {
        let pattern = input().into_pattern().unwrap();
        assert_eq!(pattern.name, "XOR");
        assert_eq!(pattern.category.as_deref(), Some("bitwise"));
        assert_eq!(pattern.tags, vec!["bits"]);
        assert_eq!(pattern.origin.as_deref(), Some("cli"));
    }

    #[test]
    fn test_missing_fields_rejected() {
        let mut input = input();
        input.solution = None;
        assert!(input.into_pattern().is_err());
    }

    #[test]
    fn test_file_input_with_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        std::fs::write(&path, r#"{"name": "Mask", "solution": "and", "confidence": 0.9}"#).unwrap();

        let mut input = input();
        input.file = Some(path);
        input.name = None;
        input.id = Some("mask_1".to_string());

        let pattern = input.into_pattern().unwrap();
        assert_eq!(pattern.name, "Mask");
        assert_eq!(pattern.id.as_deref(), Some("mask_1"));
        assert_eq!(pattern.confidence, 0.9);
    }
}
