use std::path::{Path, PathBuf};

/// File locations for one domain's knowledge base
#[derive(Debug, Clone)]
pub struct ExpertPaths {
    pub data_dir: PathBuf,
    pub domain_dir: PathBuf,
    pub patterns: PathBuf,
    pub embeddings: PathBuf,
}

impl ExpertPaths {
    pub fn new(data_dir: &Path, domain: &str) -> Self {
        let domain_dir = data_dir.join(domain);
        Self {
            patterns: domain_dir.join("patterns.json"),
            embeddings: domain_dir.join("embeddings.db"),
            domain_dir,
            data_dir: data_dir.to_path_buf(),
        }
    }

    /// Domains that have a pattern file under `data_dir`
    pub fn discover_domains(data_dir: &Path) -> Vec<String> {
        let pattern = data_dir.join("*").join("patterns.json");
        let Some(pattern) = pattern.to_str() else {
            return Vec::new();
        };

        let mut domains: Vec<String> = glob::glob(pattern)
            .map(|paths| {
                paths
                    .flatten()
                    .filter_map(|p| {
                        p.parent()
                            .and_then(|d| d.file_name())
                            .and_then(|s| s.to_str())
                            .map(String::from)
                    })
                    .collect()
            })
            .unwrap_or_default();

        domains.sort();
        domains
    }
}
