//! Stripe - a contiguous run of samples with copy-on-write storage

use std::sync::Arc;

use crate::types::Sample;

/// A contiguous run of samples
///
/// The sample data lives behind an `Arc`, so cloning a stripe is cheap and
/// readers can hold a snapshot while the track keeps changing. Mutation
/// goes through [`Arc::make_mut`], which copies the data only if a snapshot
/// still shares it.
///
/// A stripe does not know its own position; the track derives the start
/// offset from the cumulative length of the preceding stripes.
#[derive(Debug, Clone, Default)]
pub struct Stripe {
    samples: Arc<Vec<Sample>>,
}

impl Stripe {
    /// Create a stripe filled with silence
    pub fn zeroed(length: usize) -> Self {
        Self::from_samples(vec![0; length])
    }

    /// Create a stripe from existing sample data
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        Self {
            samples: Arc::new(samples),
        }
    }

    /// Number of samples in this stripe
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the stripe holds no samples
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Read access to the sample data
    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Check if two stripes share the same storage (no copy happened yet)
    pub fn shares_storage(&self, other: &Stripe) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }

    /// Overwrite samples starting at `offset`, returns the number written
    ///
    /// Never grows the stripe: data beyond the stripe end is ignored.
    pub fn overwrite(&mut self, offset: usize, data: &[Sample]) -> usize {
        if offset >= self.len() {
            return 0;
        }
        let count = data.len().min(self.len() - offset);
        let samples = Arc::make_mut(&mut self.samples);
        samples[offset..offset + count].copy_from_slice(&data[..count]);
        count
    }

    /// Split the stripe at `at`, keeping `[0, at)` and returning `[at, len)`
    pub fn split_off(&mut self, at: usize) -> Stripe {
        let at = at.min(self.len());
        match Arc::get_mut(&mut self.samples) {
            Some(samples) => Stripe::from_samples(samples.split_off(at)),
            None => {
                // Shared with a reader snapshot: copy both halves
                let tail = self.samples[at..].to_vec();
                self.samples = Arc::new(self.samples[..at].to_vec());
                Stripe::from_samples(tail)
            }
        }
    }

    /// Append the samples of another stripe to this one
    pub fn append(&mut self, other: &Stripe) {
        Arc::make_mut(&mut self.samples).extend_from_slice(other.samples());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrite_is_bounded() {
        let mut stripe = Stripe::zeroed(4);
        assert_eq!(stripe.overwrite(2, &[1, 2, 3]), 2);
        assert_eq!(stripe.samples(), &[0, 0, 1, 2]);
        assert_eq!(stripe.overwrite(4, &[9]), 0);
    }

    #[test]
    fn test_copy_on_write() {
        let mut stripe = Stripe::from_samples(vec![1, 2, 3]);
        let snapshot = stripe.clone();
        assert!(stripe.shares_storage(&snapshot));

        stripe.overwrite(0, &[7]);
        assert!(!stripe.shares_storage(&snapshot));
        assert_eq!(snapshot.samples(), &[1, 2, 3]);
        assert_eq!(stripe.samples(), &[7, 2, 3]);
    }

    #[test]
    fn test_split_shared_stripe() {
        let mut stripe = Stripe::from_samples(vec![1, 2, 3, 4]);
        let snapshot = stripe.clone();
        let tail = stripe.split_off(1);
        assert_eq!(stripe.samples(), &[1]);
        assert_eq!(tail.samples(), &[2, 3, 4]);
        assert_eq!(snapshot.len(), 4);
    }
}
