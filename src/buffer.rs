//! Fixed-capacity ring of [`ContainerStats`] samples.

use crate::info::ContainerStats;

/// A fixed-capacity circular buffer that overwrites its oldest sample when full.
///
/// Samples are stored in a preallocated `Vec` addressed by a head index, so
/// pushing never allocates once the buffer has filled up. Pushes must be strictly
/// newer than the latest buffered sample.
#[derive(Debug, Clone)]
pub struct StatsBuffer {
    samples: Vec<ContainerStats>,
    capacity: usize,
    /// Index of the oldest sample once the buffer is full.
    head: usize,
}

/// Returned by [`StatsBuffer::push`] for samples that are not newer than the latest one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("sample at {timestamp} is not newer than latest buffered sample at {latest}")]
pub struct OutOfOrderSample {
    pub timestamp: u64,
    pub latest: u64,
}

impl StatsBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Appends a sample, evicting the oldest one if the buffer is full.
    ///
    /// A buffer with zero capacity accepts and discards every sample.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfOrderSample`] and leaves the buffer untouched if `stats` is
    /// not strictly newer than the latest buffered sample.
    pub fn push(&mut self, stats: ContainerStats) -> Result<(), OutOfOrderSample> {
        if let Some(latest) = self.latest() {
            if stats.timestamp <= latest.timestamp {
                return Err(OutOfOrderSample {
                    timestamp: stats.timestamp,
                    latest: latest.timestamp,
                });
            }
        }
        if self.capacity == 0 {
            return Ok(());
        }

        if self.samples.len() < self.capacity {
            self.samples.push(stats);
        } else {
            self.samples[self.head] = stats;
            self.head = (self.head + 1) % self.capacity;
        }
        Ok(())
    }

    /// Returns the most recently pushed sample.
    pub fn latest(&self) -> Option<&ContainerStats> {
        if self.samples.is_empty() {
            return None;
        }
        let idx = (self.head + self.samples.len() - 1) % self.samples.len();
        self.samples.get(idx)
    }

    /// Iterates over the buffered samples from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ContainerStats> {
        let (newer, older) = self.samples.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    /// Copies the buffered samples taken strictly after `timestamp`, oldest first.
    ///
    /// With `None` every buffered sample is returned.
    pub fn newer_than(&self, timestamp: Option<u64>) -> Vec<ContainerStats> {
        match timestamp {
            Some(ts) => self.iter().filter(|s| s.timestamp > ts).cloned().collect(),
            None => self.iter().cloned().collect(),
        }
    }

    /// Copies up to `n` of the most recent samples, oldest first.
    pub fn last_n(&self, n: usize) -> Vec<ContainerStats> {
        let skip = self.samples.len().saturating_sub(n);
        self.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(timestamp: u64) -> ContainerStats {
        ContainerStats {
            timestamp,
            ..Default::default()
        }
    }

    fn timestamps<'a>(it: impl IntoIterator<Item = &'a ContainerStats>) -> Vec<u64> {
        it.into_iter().map(|s| s.timestamp).collect()
    }

    #[test]
    fn test_push_until_full() {
        let mut buf = StatsBuffer::new(3);
        assert!(buf.is_empty());
        assert_eq!(buf.latest(), None);

        buf.push(sample(1)).unwrap();
        buf.push(sample(2)).unwrap();
        assert_eq!(buf.len(), 2);
        assert_eq!(timestamps(buf.iter()), vec![1, 2]);
        assert_eq!(buf.latest().unwrap().timestamp, 2);
    }

    #[test]
    fn test_overwrites_oldest() {
        let mut buf = StatsBuffer::new(3);
        for ts in 1..=7 {
            buf.push(sample(ts)).unwrap();
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.capacity(), 3);
        assert_eq!(timestamps(buf.iter()), vec![5, 6, 7]);
        assert_eq!(buf.latest().unwrap().timestamp, 7);
    }

    #[test]
    fn test_rejects_out_of_order() {
        let mut buf = StatsBuffer::new(2);
        buf.push(sample(10)).unwrap();
        let err = buf.push(sample(10)).unwrap_err();
        assert_eq!(
            err,
            OutOfOrderSample {
                timestamp: 10,
                latest: 10
            }
        );
        assert!(buf.push(sample(5)).is_err());
        assert_eq!(timestamps(buf.iter()), vec![10]);
    }

    #[test]
    fn test_zero_capacity_discards() {
        let mut buf = StatsBuffer::new(0);
        buf.push(sample(1)).unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.latest(), None);
    }

    #[test]
    fn test_newer_than() {
        let mut buf = StatsBuffer::new(4);
        for ts in [10, 20, 30, 40, 50] {
            buf.push(sample(ts)).unwrap();
        }
        assert_eq!(timestamps(&buf.newer_than(None)), vec![20, 30, 40, 50]);
        assert_eq!(timestamps(&buf.newer_than(Some(30))), vec![40, 50]);
        assert_eq!(timestamps(&buf.newer_than(Some(5))), vec![20, 30, 40, 50]);
        assert!(buf.newer_than(Some(50)).is_empty());
    }

    #[test]
    fn test_last_n() {
        let mut buf = StatsBuffer::new(4);
        for ts in 1..=6 {
            buf.push(sample(ts)).unwrap();
        }
        assert_eq!(timestamps(&buf.last_n(2)), vec![5, 6]);
        assert_eq!(timestamps(&buf.last_n(10)), vec![3, 4, 5, 6]);
        assert!(buf.last_n(0).is_empty());
    }
}
