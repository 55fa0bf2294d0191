use crate::transport::StatsSample;
use std::collections::VecDeque;

/// Bounded history of stats samples for one connection, oldest first.
#[derive(Debug, Clone)]
pub struct StatsHistory {
    samples: VecDeque<StatsSample>,
    capacity: usize,
}

impl StatsHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: StatsSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn latest(&self) -> Option<&StatsSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn window(&self) -> Option<(Option<&StatsSample>, &StatsSample)> {
        let latest = self.samples.back()?;
        let previous = self.samples.len().checked_sub(2).and_then(|i| self.samples.get(i));
        Some((previous, latest))
    }

    /// lost / (lost + received) over the last sampling window, or over the
    /// whole connection when only one sample exists. `None` without traffic.
    pub fn loss_ratio(&self) -> Option<f64> {
        let (previous, latest) = self.window()?;
        let (lost, received) = match previous {
            Some(prev) => (
                latest.packets_lost.saturating_sub(prev.packets_lost),
                latest.packets_received.saturating_sub(prev.packets_received),
            ),
            None => (latest.packets_lost, latest.packets_received),
        };

        let total = lost + received;
        if total == 0 {
            return None;
        }
        Some(lost as f64 / total as f64)
    }

    pub fn inbound_bitrate_bps(&self) -> Option<f64> {
        let (previous, latest) = self.window()?;
        let previous = previous?;
        let elapsed = latest.at.checked_duration_since(previous.at)?.as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        let bytes = latest.bytes_received.saturating_sub(previous.bytes_received);
        Some(bytes as f64 * 8.0 / elapsed)
    }
}
