//! Streaming mean/variance accumulation for sample chains.

use std::sync::{Arc, Mutex};

use crate::error::SamplerError;
use crate::sampler::SampleCallback;

/// Welford running mean and M2 accumulator over vector-valued samples.
///
/// Numerically stable for long chains; `variance` divides by n − 1.
#[derive(Debug, Clone)]
pub struct Welford {
    count: usize,
    mean: Vec<f64>,
    m2: Vec<f64>,
}

impl Welford {
    pub fn new(dim: usize) -> Self {
        Self {
            count: 0,
            mean: vec![0.0; dim],
            m2: vec![0.0; dim],
        }
    }

    pub fn update(&mut self, sample: &[f64]) {
        assert_eq!(sample.len(), self.mean.len());
        self.count += 1;
        let inv = 1.0 / self.count as f64;
        for i in 0..sample.len() {
            let delta = sample[i] - self.mean[i];
            self.mean[i] += delta * inv;
            let delta2 = sample[i] - self.mean[i];
            self.m2[i] += delta * delta2;
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Pointwise sample variance; zeros until at least two samples are seen.
    pub fn variance(&self) -> Vec<f64> {
        if self.count < 2 {
            return vec![0.0; self.m2.len()];
        }
        let inv = 1.0 / (self.count - 1) as f64;
        self.m2.iter().map(|m2| m2 * inv).collect()
    }
}

/// Sample callback accumulating pointwise mean and variance into a shared
/// accumulator the caller keeps a handle to.
pub fn mean_variance_callback(acc: Arc<Mutex<Welford>>) -> SampleCallback {
    SampleCallback::new(move |it, sample| {
        let mut acc = acc.lock().map_err(|_| SamplerError::Callback {
            iteration: it,
            message: "statistics accumulator poisoned".into(),
        })?;
        acc.update(sample);
        Ok(())
    })
}

/// Sample callback appending the scalar quantity of interest ⟨m, x⟩ to a
/// shared chain, one entry per iteration.
pub fn qoi_callback(measurement: Vec<f64>, chain: Arc<Mutex<Vec<f64>>>) -> SampleCallback {
    SampleCallback::new(move |it, sample| {
        let q = measurement
            .iter()
            .zip(sample)
            .map(|(m, x)| m * x)
            .sum::<f64>();
        chain
            .lock()
            .map_err(|_| SamplerError::Callback {
                iteration: it,
                message: "qoi chain poisoned".into(),
            })?
            .push(q);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn matches_two_pass_statistics() {
        let samples = [
            vec![1.0, -2.0],
            vec![2.0, 0.5],
            vec![0.0, 1.5],
            vec![4.0, -1.0],
        ];
        let mut w = Welford::new(2);
        for s in &samples {
            w.update(s);
        }
        let n = samples.len() as f64;
        for i in 0..2 {
            let mean: f64 = samples.iter().map(|s| s[i]).sum::<f64>() / n;
            let var: f64 =
                samples.iter().map(|s| (s[i] - mean).powi(2)).sum::<f64>() / (n - 1.0);
            assert_relative_eq!(w.mean()[i], mean, epsilon = 1e-14);
            assert_relative_eq!(w.variance()[i], var, epsilon = 1e-14);
        }
    }

    #[test]
    fn variance_needs_two_samples() {
        let mut w = Welford::new(1);
        w.update(&[3.0]);
        assert_eq!(w.variance(), vec![0.0]);
    }
}
