//! Weighted random selection used by keyword-only search
//!
//! Candidates are bucketed into score bands and drawn proportionally to the
//! band weight, so strong matches dominate while weaker ones still surface
//! now and then. Repeating a query can therefore return a different set.

use std::collections::HashSet;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Weighted draw rounds per requested item before topping up uniformly
const DRAW_ROUNDS: usize = 3;

/// Selection weight for a total keyword score
pub fn band_weight(score: f32) -> u32 {
    if score < 50.0 {
        1
    } else if score < 70.0 {
        3
    } else if score < 85.0 {
        8
    } else {
        15
    }
}

/// Seedable weighted sampler shared by concurrent searches
pub struct WeightedSelector {
    rng: Mutex<StdRng>,
}

impl WeightedSelector {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Pick `count` distinct indices into `scores`
    ///
    /// Draws with probability proportional to [`band_weight`], discarding
    /// repeats. If the weighted rounds yield too few distinct picks, the rest
    /// are chosen uniformly from the candidates not yet picked.
    pub fn select(&self, scores: &[f32], count: usize) -> Vec<usize> {
        let target = count.min(scores.len());
        if target == 0 {
            return Vec::new();
        }

        let weights: Vec<u32> = scores.iter().map(|s| band_weight(*s)).collect();
        let total: u32 = weights.iter().sum();

        let mut rng = self.rng.lock();
        let mut picked: Vec<usize> = Vec::with_capacity(target);
        let mut seen = HashSet::with_capacity(target);

        for _ in 0..target * DRAW_ROUNDS {
            if picked.len() == target {
                break;
            }
            let mut r = rng.gen_range(0..total);
            let idx = weights
                .iter()
                .position(|&w| {
                    if r < w {
                        true
                    } else {
                        r -= w;
                        false
                    }
                })
                .unwrap_or(weights.len() - 1);
            if seen.insert(idx) {
                picked.push(idx);
            }
        }

        if picked.len() < target {
            let mut rest: Vec<usize> = (0..scores.len()).filter(|i| !seen.contains(i)).collect();
            rest.shuffle(&mut *rng);
            picked.extend(rest.into_iter().take(target - picked.len()));
        }

        picked
    }
}

impl Default for WeightedSelector {
    fn default() -> Self {
        Self::from_entropy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_weights() {
        assert_eq!(band_weight(0.0), 1);
        assert_eq!(band_weight(49.9), 1);
        assert_eq!(band_weight(50.0), 3);
        assert_eq!(band_weight(70.0), 8);
        assert_eq!(band_weight(84.9), 8);
        assert_eq!(band_weight(85.0), 15);
        assert_eq!(band_weight(130.0), 15);
    }

    #[test]
    fn test_selects_distinct_and_bounded() {
        let selector = WeightedSelector::seeded(7);
        let scores = [1.0, 2.0, 90.0, 55.0, 3.0];

        for count in 0..8 {
            let picked = selector.select(&scores, count);
            assert_eq!(picked.len(), count.min(scores.len()));
            let distinct: HashSet<_> = picked.iter().collect();
            assert_eq!(distinct.len(), picked.len());
            assert!(picked.iter().all(|&i| i < scores.len()));
        }
        assert!(selector.select(&[], 3).is_empty());
    }

    #[test]
    fn test_high_band_selected_more_often() {
        let selector = WeightedSelector::seeded(42);
        let scores = [100.0, 100.0, 100.0, 1.0, 1.0, 1.0];

        let mut high = 0;
        let mut low = 0;
        for _ in 0..2000 {
            for idx in selector.select(&scores, 2) {
                if idx < 3 {
                    high += 1;
                } else {
                    low += 1;
                }
            }
        }

        assert_eq!(high + low, 4000);
        assert!(high > low * 3, "high={} low={}", high, low);
    }

    #[test]
    fn test_same_seed_same_choice() {
        let scores = [10.0, 60.0, 75.0, 90.0, 20.0, 5.0];
        let a = WeightedSelector::seeded(99).select(&scores, 3);
        let b = WeightedSelector::seeded(99).select(&scores, 3);
        assert_eq!(a, b);
    }
}
