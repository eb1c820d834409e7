//! Noise - mixes white noise into the signal

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::pipeline::SampleFilter;
use crate::plugin::{parse_param, FilterPlugin, PluginError, PluginParams, PluginResult};
use crate::types::{clamp_sample, Sample, SAMPLE_MAX};

/// Replaces a share of the signal by uniform white noise
///
/// Parameters:
/// - `0`: noise level, 0.0 (signal only) to 1.0 (noise only)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoisePlugin;

impl NoisePlugin {
    fn parse(params: &[String]) -> PluginResult<f64> {
        let level: f64 = parse_param("noise", params, 0, "level")?;
        if !(0.0..=1.0).contains(&level) {
            return Err(PluginError::invalid_params("noise", format!("level {level} outside 0..=1")));
        }
        Ok(level)
    }
}

pub struct NoiseFilter {
    level: f64,
    rng: StdRng,
}

impl std::fmt::Debug for NoiseFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseFilter").field("level", &self.level).finish()
    }
}

impl NoiseFilter {
    pub fn new(level: f64) -> Self {
        Self {
            level,
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible noise
    pub fn with_seed(level: f64, seed: u64) -> Self {
        Self {
            level,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn level(&self) -> f64 {
        self.level
    }
}

impl SampleFilter for NoiseFilter {
    fn process(&mut self, blocks: &mut [Vec<Sample>]) {
        if self.level <= 0.0 {
            return;
        }
        let keep = 1.0 - self.level;
        let amplitude = SAMPLE_MAX as f64 * self.level;
        for block in blocks.iter_mut() {
            for s in block.iter_mut() {
                let noise: f64 = self.rng.gen_range(-1.0..=1.0);
                *s = clamp_sample((*s as f64 * keep + noise * amplitude).round() as i64);
            }
        }
    }
}

impl FilterPlugin for NoisePlugin {
    type Filter = NoiseFilter;

    fn name(&self) -> &str {
        "noise"
    }

    fn description(&self) -> &str {
        "Noise"
    }

    fn default_params(&self) -> PluginParams {
        vec!["0.5".to_string()]
    }

    fn load_params(&self, params: &[String]) -> PluginResult<()> {
        Self::parse(params).map(|_| ())
    }

    fn create_filter(&self, _tracks: usize) -> NoiseFilter {
        NoiseFilter::new(0.0)
    }

    fn update_filter(&self, filter: &mut NoiseFilter, params: &[String], force: bool) -> PluginResult<()> {
        let level = Self::parse(params)?;
        if !force && level == filter.level {
            return Ok(());
        }
        log::debug!("Noise level {:.3}", level);
        filter.level = level;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_level_passes_through() {
        let mut filter = NoiseFilter::with_seed(0.0, 1);
        let mut blocks = vec![vec![1, 2, 3]];
        filter.process(&mut blocks);
        assert_eq!(blocks[0], vec![1, 2, 3]);
    }

    #[test]
    fn test_full_level_is_noise() {
        let mut filter = NoiseFilter::with_seed(1.0, 7);
        let mut blocks = vec![vec![0; 1000], vec![SAMPLE_MAX; 1000]];
        filter.process(&mut blocks);
        for block in &blocks {
            assert!(block.iter().all(|s| s.abs() <= SAMPLE_MAX));
            assert!(block.iter().any(|&s| s > 0));
            assert!(block.iter().any(|&s| s < 0));
        }
        // Independent noise per track
        assert_ne!(blocks[0], blocks[1]);
    }

    #[test]
    fn test_seeded_noise_repeats() {
        let mut a = NoiseFilter::with_seed(0.3, 42);
        let mut b = NoiseFilter::with_seed(0.3, 42);
        let mut x = vec![vec![500; 64]];
        let mut y = x.clone();
        a.process(&mut x);
        b.process(&mut y);
        assert_eq!(x, y);
    }

    #[test]
    fn test_level_range() {
        let plugin = NoisePlugin;
        assert!(plugin.load_params(&["1".to_string()]).is_ok());
        assert!(plugin.load_params(&["1.5".to_string()]).is_err());
        assert!(plugin.load_params(&["-0.1".to_string()]).is_err());
    }
}
