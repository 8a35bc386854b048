//! Stationary Richardson driver for sampler chains.
//!
//! Repeatedly applies a sampler to a fixed right-hand side. There is no
//! convergence monitor by construction: the chain never converges in the
//! solver sense, it mixes, so the stopping rule is the iteration count
//! alone. The per-sampler callback fires strictly after each apply returns;
//! a callback error aborts the run.

use crate::error::SamplerError;
use crate::sampler::Sampler;

/// Fixed-iteration driver.
#[derive(Debug, Clone, Copy)]
pub struct Richardson {
    pub iterations: usize,
}

impl Richardson {
    pub fn new(iterations: usize) -> Self {
        Self { iterations }
    }

    /// Run the chain, firing the sampler's callback after every iteration.
    pub fn sample<S: Sampler + ?Sized>(
        &self,
        sampler: &mut S,
        b: &[f64],
        x: &mut [f64],
    ) -> Result<(), SamplerError> {
        for it in 0..self.iterations {
            sampler.apply(b, x)?;
            sampler.fire_callback(it, x)?;
        }
        Ok(())
    }

    /// Run without touching the callback, e.g. to burn in a chain.
    pub fn burnin<S: Sampler + ?Sized>(
        &self,
        sampler: &mut S,
        b: &[f64],
        x: &mut [f64],
    ) -> Result<(), SamplerError> {
        for _ in 0..self.iterations {
            sampler.apply(b, x)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::GaussianStream;
    use crate::sampler::SampleCallback;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSampler {
        applies: usize,
        callback: Option<SampleCallback>,
    }

    impl Sampler for CountingSampler {
        fn apply(&mut self, _b: &[f64], y: &mut [f64]) -> Result<(), SamplerError> {
            self.applies += 1;
            y[0] = self.applies as f64;
            Ok(())
        }
        fn set_callback(&mut self, cb: SampleCallback) {
            self.callback = Some(cb);
        }
        fn clear_callback(&mut self) {
            self.callback = None;
        }
        fn fire_callback(&mut self, it: usize, y: &[f64]) -> Result<(), SamplerError> {
            if let Some(cb) = &mut self.callback {
                cb.call(it, y)?;
            }
            Ok(())
        }
        fn set_rng(&mut self, _rng: GaussianStream) {}
    }

    #[test]
    fn callback_fires_once_per_iteration_after_apply() {
        let mut sampler = CountingSampler {
            applies: 0,
            callback: None,
        };
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_cb = seen.clone();
        sampler.set_callback(SampleCallback::new(move |it, y| {
            // The state the callback sees is the one apply just produced.
            assert_eq!(y[0] as usize, it + 1);
            seen_cb.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        let driver = Richardson::new(7);
        let mut x = vec![0.0];
        driver.sample(&mut sampler, &[0.0], &mut x).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 7);
        assert_eq!(sampler.applies, 7);
    }

    #[test]
    fn callback_error_aborts_the_run() {
        let mut sampler = CountingSampler {
            applies: 0,
            callback: None,
        };
        sampler.set_callback(SampleCallback::new(|it, _y| {
            if it == 2 {
                Err(SamplerError::Callback {
                    iteration: it,
                    message: "synthetic failure".into(),
                })
            } else {
                Ok(())
            }
        }));
        let driver = Richardson::new(10);
        let mut x = vec![0.0];
        let err = driver.sample(&mut sampler, &[0.0], &mut x);
        assert!(err.is_err());
        assert_eq!(sampler.applies, 3);
    }

    #[test]
    fn burnin_skips_the_callback() {
        let mut sampler = CountingSampler {
            applies: 0,
            callback: None,
        };
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_cb = seen.clone();
        sampler.set_callback(SampleCallback::new(move |_, _| {
            seen_cb.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        let driver = Richardson::new(5);
        let mut x = vec![0.0];
        driver.burnin(&mut sampler, &[0.0], &mut x).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(sampler.applies, 5);
    }
}
