use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;

/// Execution resources handed to a running procedure.
///
/// Procedures execute on a single thread. The pool only records how many processes
/// the caller has available and owns the seeded random number generator, so that a
/// run is reproducible for a given seed.
#[derive(Debug)]
pub struct ProcessPool {
    n_processes: usize,
    seed: u64,
    rng: RefCell<StdRng>,
}

impl ProcessPool {
    pub fn new(n_processes: usize, seed: u64) -> Self {
        Self {
            n_processes: n_processes.max(1),
            seed,
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn n_processes(&self) -> usize {
        self.n_processes
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns a uniform random number in `[0, 1)`.
    pub fn random(&self) -> f64 {
        self.rng.borrow_mut().gen_range(0.0..1.0)
    }

    /// Returns a uniform random number in `[-1, 1)`.
    pub fn random_plus_minus_one(&self) -> f64 {
        self.rng.borrow_mut().gen_range(-1.0..1.0)
    }

    /// Returns a uniform random index in `[0, upper)`, or `None` when `upper` is zero.
    pub fn random_index(&self, upper: usize) -> Option<usize> {
        (upper > 0).then(|| self.rng.borrow_mut().gen_range(0..upper))
    }

    /// Restores the generator to the state it had right after construction.
    pub fn reseed(&self) {
        *self.rng.borrow_mut() = StdRng::seed_from_u64(self.seed);
    }
}

impl Default for ProcessPool {
    fn default() -> Self {
        Self::new(1, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_gives_same_sequence() {
        let a = ProcessPool::new(1, 42);
        let b = ProcessPool::new(4, 42);
        let xs: Vec<f64> = (0..5).map(|_| a.random()).collect();
        let ys: Vec<f64> = (0..5).map(|_| b.random()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn values_lie_in_their_ranges() {
        let pool = ProcessPool::new(1, 7);
        for _ in 0..100 {
            let x = pool.random();
            assert!((0.0..1.0).contains(&x));
            let y = pool.random_plus_minus_one();
            assert!((-1.0..1.0).contains(&y));
        }
        assert_eq!(pool.random_index(0), None);
        assert!(pool.random_index(3).unwrap() < 3);
    }

    #[test]
    fn reseed_restarts_the_sequence() {
        let pool = ProcessPool::new(1, 3);
        let first = pool.random();
        pool.random();
        pool.reseed();
        assert_eq!(pool.random(), first);
    }
}
