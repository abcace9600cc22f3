//! Randomness behind the simulated-variance branches of the executor.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Source of uniform samples in `[0, 1)`.
pub trait Entropy: Send + Sync {
    fn sample(&self) -> f64;

    /// True with probability `p`.
    fn chance(&self, p: f64) -> bool {
        self.sample() < p
    }
}

/// Thread-local OS-seeded generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadEntropy;

impl Entropy for ThreadEntropy {
    fn sample(&self) -> f64 {
        rand::thread_rng().r#gen::<f64>()
    }
}

/// Reproducible generator for a fixed seed.
#[derive(Debug)]
pub struct SeededEntropy {
    rng: Mutex<StdRng>,
}

impl SeededEntropy {
    pub fn new(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

impl Entropy for SeededEntropy {
    fn sample(&self) -> f64 {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).r#gen::<f64>()
    }
}

/// Replays a fixed list of samples, then repeats the last one.
///
/// Lets a caller force a particular branch without statistical sampling.
#[derive(Debug)]
pub struct ScriptedEntropy {
    samples: Mutex<VecDeque<f64>>,
    last: Mutex<f64>,
}

impl ScriptedEntropy {
    pub fn new(samples: impl IntoIterator<Item = f64>) -> Self {
        Self { samples: Mutex::new(samples.into_iter().collect()), last: Mutex::new(0.5) }
    }
}

impl Entropy for ScriptedEntropy {
    fn sample(&self) -> f64 {
        let next = self.samples.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = next {
            *last = value.clamp(0.0, 0.999_999);
        }
        *last
    }
}
