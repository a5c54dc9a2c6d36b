//! Per-chain watermarks of processed event timestamps.

use dashmap::DashMap;

/// Last processed block timestamp per chain.
///
/// Values only move forward. Memory only: after a restart every chain starts
/// again from zero.
#[derive(Debug, Default)]
pub struct Watermarks {
    inner: DashMap<u64, u64>,
}

impl Watermarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current watermark, zero if the chain was never polled.
    pub fn get(&self, chain_id: u64) -> u64 {
        self.inner.get(&chain_id).map(|v| *v).unwrap_or(0)
    }

    /// Raise the watermark to `timestamp` if it is higher. Returns the new value.
    pub fn advance(&self, chain_id: u64, timestamp: u64) -> u64 {
        let mut entry = self.inner.entry(chain_id).or_insert(0);
        if timestamp > *entry {
            *entry = timestamp;
        }
        *entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic() {
        let marks = Watermarks::new();
        assert_eq!(marks.get(1), 0);

        assert_eq!(marks.advance(1, 150), 150);
        assert_eq!(marks.advance(1, 100), 150);
        assert_eq!(marks.advance(1, 150), 150);
        assert_eq!(marks.advance(1, 151), 151);
        assert_eq!(marks.get(2), 0);

        marks.advance(2, 7);
        assert_eq!(marks.get(1), 151);
        assert_eq!(marks.get(2), 7);
    }
}
