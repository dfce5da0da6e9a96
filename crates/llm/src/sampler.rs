//! Next-token selection from a row of logits.
//!
//! Greedy when `temperature <= 0` or `top_k == 1`. Otherwise: temperature
//! scaling, top-k cut, softmax, top-p (nucleus) cut, then one draw from the
//! renormalised distribution.

use std::cmp::Ordering;

use crate::{LlmError, SearchOptions};

/// Index of the largest finite logit; ties go to the lowest index.
pub fn argmax(logits: &[f32]) -> Option<usize> {
    logits
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .fold(None, |best: Option<(usize, f32)>, (idx, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((idx, v)),
        })
        .map(|(idx, _)| idx)
}

/// Stateful sampler; owns the RNG so a seeded run is reproducible end to end.
#[derive(Debug, Clone)]
pub struct Sampler {
    temperature: f32,
    top_k: usize,
    top_p: f32,
    rng: fastrand::Rng,
}

impl Sampler {
    pub fn new(options: &SearchOptions) -> Self {
        let rng = match options.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Self {
            temperature: options.temperature,
            top_k: options.top_k,
            top_p: options.top_p,
            rng,
        }
    }

    pub fn is_greedy(&self) -> bool {
        self.temperature <= 0.0 || self.top_k == 1
    }

    pub fn sample(&mut self, logits: &[f32]) -> Result<u32, LlmError> {
        if self.is_greedy() {
            return argmax(logits)
                .map(|idx| idx as u32)
                .ok_or_else(no_candidates);
        }

        let temperature = f64::from(self.temperature);
        let mut candidates: Vec<(usize, f64)> = logits
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(idx, &v)| (idx, f64::from(v) / temperature))
            .collect();
        if candidates.is_empty() {
            return Err(no_candidates());
        }

        // Stable sort keeps lower indices first among equal logits.
        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        if self.top_k > 0 {
            candidates.truncate(self.top_k);
        }

        let max = candidates[0].1;
        let mut probs: Vec<(usize, f64)> = candidates
            .iter()
            .map(|&(idx, logit)| (idx, (logit - max).exp()))
            .collect();
        let total: f64 = probs.iter().map(|(_, p)| p).sum();
        for (_, p) in &mut probs {
            *p /= total;
        }

        let top_p = f64::from(self.top_p);
        if top_p < 1.0 {
            let mut cumulative = 0.0;
            let mut keep = probs.len();
            for (i, (_, p)) in probs.iter().enumerate() {
                cumulative += p;
                if cumulative >= top_p {
                    keep = i + 1;
                    break;
                }
            }
            probs.truncate(keep);
        }

        let mass: f64 = probs.iter().map(|(_, p)| p).sum();
        let mut draw = self.rng.f64() * mass;
        for &(idx, p) in &probs {
            if draw < p {
                return Ok(idx as u32);
            }
            draw -= p;
        }
        // Rounding can leave `draw` a hair above the last bucket.
        Ok(probs[probs.len() - 1].0 as u32)
    }
}

fn no_candidates() -> LlmError {
    LlmError::InvalidInput("logits are empty or contain no finite values".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler(temperature: f32, top_k: usize, top_p: f32, seed: u64) -> Sampler {
        Sampler::new(&SearchOptions {
            temperature,
            top_k,
            top_p,
            seed: Some(seed),
            ..SearchOptions::default()
        })
    }

    #[test]
    fn argmax_prefers_lowest_index_on_ties() {
        assert_eq!(argmax(&[0.1, 0.9, 0.9, 0.2]), Some(1));
    }

    #[test]
    fn argmax_skips_non_finite() {
        assert_eq!(argmax(&[f32::NAN, 0.5, f32::INFINITY, 0.7]), Some(3));
        assert_eq!(argmax(&[]), None);
        assert_eq!(argmax(&[f32::NAN]), None);
    }

    #[test]
    fn zero_temperature_is_greedy() {
        let mut s = sampler(0.0, 50, 1.0, 7);
        assert!(s.is_greedy());
        for _ in 0..20 {
            assert_eq!(s.sample(&[1.0, 3.0, 2.0]).unwrap(), 1);
        }
    }

    #[test]
    fn top_k_one_is_greedy_even_when_hot() {
        let mut s = sampler(5.0, 1, 1.0, 7);
        for _ in 0..20 {
            assert_eq!(s.sample(&[1.0, 0.0, 4.0, 3.9]).unwrap(), 2);
        }
    }

    #[test]
    fn top_k_restricts_candidates() {
        let mut s = sampler(10.0, 2, 1.0, 42);
        for _ in 0..200 {
            let id = s.sample(&[5.0, 0.0, 4.0, 0.0, 0.0]).unwrap();
            assert!(id == 0 || id == 2, "sampled {id}");
        }
    }

    #[test]
    fn top_p_keeps_the_nucleus() {
        // Token 1 holds almost all the mass; a tight nucleus leaves only it.
        let mut s = sampler(1.0, 0, 0.5, 3);
        for _ in 0..100 {
            assert_eq!(s.sample(&[0.0, 10.0, 0.0, 0.0]).unwrap(), 1);
        }
    }

    #[test]
    fn seeded_sampling_is_reproducible() {
        let logits = [0.3, 0.1, 0.5, 0.2, 0.4];
        let mut a = sampler(1.0, 0, 1.0, 1234);
        let mut b = sampler(1.0, 0, 1.0, 1234);
        let left: Vec<u32> = (0..50).map(|_| a.sample(&logits).unwrap()).collect();
        let right: Vec<u32> = (0..50).map(|_| b.sample(&logits).unwrap()).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn sampling_covers_more_than_one_token() {
        let mut s = sampler(1.0, 0, 1.0, 99);
        let seen: std::collections::HashSet<u32> =
            (0..500).map(|_| s.sample(&[0.0, 0.0, 0.0]).unwrap()).collect();
        assert!(seen.len() > 1);
    }

    #[test]
    fn empty_logits_are_invalid_input() {
        let mut greedy = sampler(0.0, 1, 1.0, 1);
        assert!(matches!(greedy.sample(&[]), Err(LlmError::InvalidInput(_))));
        let mut hot = sampler(1.0, 0, 1.0, 1);
        assert!(matches!(
            hot.sample(&[f32::NAN, f32::NAN]),
            Err(LlmError::InvalidInput(_))
        ));
    }
}
