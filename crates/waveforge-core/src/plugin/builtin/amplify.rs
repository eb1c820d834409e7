//! Amplify - linear gain

use crate::pipeline::SampleFilter;
use crate::plugin::{parse_param, FilterPlugin, PluginError, PluginParams, PluginResult};
use crate::types::{clamp_sample, Sample};

/// Largest accepted gain factor (+40 dB)
pub const MAX_GAIN: f64 = 100.0;

/// Multiplies every sample by a constant factor
///
/// Parameters:
/// - `0`: gain factor (0.0 = silence, 1.0 = unity, 2.0 = +6dB)
#[derive(Debug, Default, Clone, Copy)]
pub struct AmplifyPlugin;

impl AmplifyPlugin {
    fn parse(params: &[String]) -> PluginResult<f64> {
        let gain: f64 = parse_param("amplify", params, 0, "gain")?;
        if !gain.is_finite() || !(0.0..=MAX_GAIN).contains(&gain) {
            return Err(PluginError::invalid_params(
                "amplify",
                format!("gain {gain} outside 0..={MAX_GAIN}"),
            ));
        }
        Ok(gain)
    }
}

/// Gain stage with saturation at the sample range
#[derive(Debug, Clone)]
pub struct AmplifyFilter {
    gain: f64,
}

impl AmplifyFilter {
    pub fn new(gain: f64) -> Self {
        Self { gain }
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }
}

impl SampleFilter for AmplifyFilter {
    fn process(&mut self, blocks: &mut [Vec<Sample>]) {
        if self.gain == 1.0 {
            return;
        }
        for block in blocks.iter_mut() {
            for s in block.iter_mut() {
                *s = clamp_sample((*s as f64 * self.gain).round() as i64);
            }
        }
    }
}

impl FilterPlugin for AmplifyPlugin {
    type Filter = AmplifyFilter;

    fn name(&self) -> &str {
        "amplify"
    }

    fn description(&self) -> &str {
        "Amplify"
    }

    fn default_params(&self) -> PluginParams {
        vec!["1.0".to_string()]
    }

    fn load_params(&self, params: &[String]) -> PluginResult<()> {
        Self::parse(params).map(|_| ())
    }

    fn create_filter(&self, _tracks: usize) -> AmplifyFilter {
        AmplifyFilter::new(1.0)
    }

    fn update_filter(&self, filter: &mut AmplifyFilter, params: &[String], _force: bool) -> PluginResult<()> {
        filter.gain = Self::parse(params)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::types::{SAMPLE_MAX, SAMPLE_MIN};

    fn params(p: &[&str]) -> PluginParams {
        p.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_gain_applied() {
        let mut filter = AmplifyFilter::new(0.5);
        let mut blocks = vec![vec![100, -100, 3]];
        filter.process(&mut blocks);
        assert_eq!(blocks[0], vec![50, -50, 2]);
    }

    #[test]
    fn test_gain_saturates() {
        let mut filter = AmplifyFilter::new(4.0);
        let mut blocks = vec![vec![SAMPLE_MAX / 2, SAMPLE_MIN / 2]];
        filter.process(&mut blocks);
        assert_eq!(blocks[0], vec![SAMPLE_MAX, SAMPLE_MIN]);
    }

    #[test]
    fn test_param_validation() {
        let plugin = AmplifyPlugin;
        assert!(plugin.load_params(&params(&["2.5"])).is_ok());
        let bad_lists: [&[&str]; 5] = [&[], &["x"], &["-1"], &["inf"], &["1000"]];
        for bad in bad_lists {
            let err = plugin.load_params(&params(bad)).unwrap_err();
            assert_eq!(err.errno(), -22, "{bad:?}");
        }
    }

    #[test]
    fn test_update_filter() {
        let plugin = AmplifyPlugin;
        let mut filter = plugin.create_filter(2);
        plugin.update_filter(&mut filter, &params(&["0.25"]), true).unwrap();
        assert_eq!(filter.gain(), 0.25);
        assert!(plugin.update_filter(&mut filter, &params(&["nope"]), false).is_err());
        assert_eq!(filter.gain(), 0.25);
    }
}
