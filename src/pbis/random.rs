use rand::{rngs::StdRng, Rng, SeedableRng};

/// Uniform source of draws in `[0, 1)`
pub trait RandomSource: Send {
    fn next_f64(&mut self) -> f64;

    /// Uniform index below `len`. `len` must be non-zero.
    fn next_index(&mut self, len: usize) -> usize {
        let scaled = (self.next_f64() * len as f64).floor() as usize;
        scaled.min(len.saturating_sub(1))
    }

    /// Uniform value below `total`. `total` must be non-zero.
    fn next_below(&mut self, total: u64) -> u64 {
        let scaled = (self.next_f64() * total as f64).floor() as u64;
        scaled.min(total.saturating_sub(1))
    }
}

/// Draws from the thread-local generator
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl ThreadRandom {
    pub fn new() -> Self {
        Self
    }
}

impl RandomSource for ThreadRandom {
    fn next_f64(&mut self) -> f64 {
        rand::random::<f64>()
    }
}

/// Reproducible draws for tests and audits
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}
