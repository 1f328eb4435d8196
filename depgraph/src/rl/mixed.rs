// src/rl/mixed.rs
//
// Mixed opponent strategy: a discrete distribution over policies, sampled
// once per episode reset.

use crate::error::{Error, Result};
use crate::rng::GameRng;

const WEIGHT_TOLERANCE: f64 = 1e-3;

/// Weighted set of opponent policies. Weights live in (0, 1] and must sum
/// to 1 within tolerance.
#[derive(Debug, Clone)]
pub struct MixedStrategy<P> {
    entries: Vec<(P, f64)>,
}

impl<P> MixedStrategy<P> {
    pub fn new(entries: Vec<(P, f64)>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::invalid_config("mixed strategy has no entries"));
        }
        let mut total = 0.0;
        for &(_, weight) in &entries {
            if weight <= 0.0 || weight > 1.0 {
                return Err(Error::invalid_config(format!(
                    "strategy weight {weight} is not in (0, 1]"
                )));
            }
            total += weight;
        }
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(Error::invalid_config(format!(
                "strategy weights sum to {total}, expected 1"
            )));
        }
        Ok(Self { entries })
    }

    /// Degenerate mixture: a single policy with weight 1.
    pub fn pure(policy: P) -> Self {
        Self {
            entries: vec![(policy, 1.0)],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(P, f64)] {
        &self.entries
    }

    /// Draw a policy by cumulative weight; the last entry absorbs any
    /// rounding slack.
    pub fn draw(&self, rng: &mut GameRng) -> &P {
        let draw = rng.unit();
        let mut total = 0.0;
        for (policy, weight) in &self.entries {
            total += weight;
            if draw <= total {
                return policy;
            }
        }
        &self.entries[self.entries.len() - 1].0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_weights() {
        assert!(MixedStrategy::new(Vec::<(u8, f64)>::new()).is_err());
        assert!(MixedStrategy::new(vec![(1u8, 0.0), (2u8, 1.0)]).is_err());
        assert!(MixedStrategy::new(vec![(1u8, 0.6), (2u8, 0.6)]).is_err());
    }

    #[test]
    fn accepts_weights_within_tolerance() {
        let mix = MixedStrategy::new(vec![(1u8, 0.5005), (2u8, 0.4999)]).unwrap();
        assert_eq!(mix.len(), 2);
    }

    #[test]
    fn draw_frequencies_match_weights() {
        let mix = MixedStrategy::new(vec![(0usize, 0.2), (1usize, 0.5), (2usize, 0.3)]).unwrap();
        let mut rng = GameRng::seed_from_u64(99);
        let trials = 20_000;
        let mut counts = [0usize; 3];
        for _ in 0..trials {
            counts[*mix.draw(&mut rng)] += 1;
        }
        let expected = [0.2, 0.5, 0.3];
        for (count, want) in counts.iter().zip(expected) {
            let freq = *count as f64 / trials as f64;
            assert!((freq - want).abs() < 0.02, "freq {freq} vs {want}");
        }
    }
}
