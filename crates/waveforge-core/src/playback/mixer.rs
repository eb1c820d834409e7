//! Channel mixer for playback

use crate::types::{clamp_sample, Sample};

/// Weights mapping input tracks to output channels
///
/// `weight(x, y)` is the share of input `x` in output `y`. With fewer
/// inputs than outputs each input is spread over a contiguous block of
/// outputs; with more inputs than outputs contiguous groups of inputs are
/// averaged into one output.
#[derive(Debug, Clone, PartialEq)]
pub struct MixerMatrix {
    inputs: usize,
    outputs: usize,
    weights: Vec<f64>,
}

impl MixerMatrix {
    pub fn new(inputs: usize, outputs: usize) -> Self {
        let mut weights = vec![0.0; inputs * outputs];
        if inputs > 0 && outputs > 0 {
            if inputs <= outputs {
                for y in 0..outputs {
                    let x = y * inputs / outputs;
                    weights[x * outputs + y] = 1.0;
                }
            } else {
                let mut group_sizes = vec![0usize; outputs];
                for x in 0..inputs {
                    group_sizes[x * outputs / inputs] += 1;
                }
                for x in 0..inputs {
                    let y = x * outputs / inputs;
                    weights[x * outputs + y] = 1.0 / group_sizes[y] as f64;
                }
            }
        }
        Self { inputs, outputs, weights }
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn outputs(&self) -> usize {
        self.outputs
    }

    pub fn weight(&self, input: usize, output: usize) -> f64 {
        if input >= self.inputs || output >= self.outputs {
            return 0.0;
        }
        self.weights[input * self.outputs + output]
    }

    /// Mix one input frame into one output frame
    ///
    /// Missing inputs count as silence, extra outputs are zeroed.
    pub fn mix(&self, input: &[Sample], output: &mut [Sample]) {
        for (y, out) in output.iter_mut().enumerate() {
            if y >= self.outputs {
                *out = 0;
                continue;
            }
            let sum: f64 = input
                .iter()
                .take(self.inputs)
                .enumerate()
                .map(|(x, &s)| s as f64 * self.weights[x * self.outputs + y])
                .sum();
            *out = clamp_sample(sum.round() as i64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_to_stereo() {
        let mixer = MixerMatrix::new(1, 2);
        let mut out = [0; 2];
        mixer.mix(&[100], &mut out);
        assert_eq!(out, [100, 100]);
    }

    #[test]
    fn test_spread_blocks() {
        // Two inputs over four outputs: 0,0,1,1
        let mixer = MixerMatrix::new(2, 4);
        let mut out = [0; 4];
        mixer.mix(&[10, 20], &mut out);
        assert_eq!(out, [10, 10, 20, 20]);
    }

    #[test]
    fn test_average_groups() {
        // Three inputs into two outputs: {0, 1} -> 0, {2} -> 1
        let mixer = MixerMatrix::new(3, 2);
        assert_eq!(mixer.weight(0, 0), 0.5);
        assert_eq!(mixer.weight(1, 0), 0.5);
        assert_eq!(mixer.weight(2, 1), 1.0);
        let mut out = [0; 2];
        mixer.mix(&[10, 30, 7], &mut out);
        assert_eq!(out, [20, 7]);
    }

    #[test]
    fn test_identity_and_empty() {
        let mixer = MixerMatrix::new(2, 2);
        let mut out = [0; 2];
        mixer.mix(&[-5, 5], &mut out);
        assert_eq!(out, [-5, 5]);

        let silent = MixerMatrix::new(0, 2);
        let mut out = [9; 2];
        silent.mix(&[], &mut out);
        assert_eq!(out, [0, 0]);
    }
}
