//! Local port and SSRC allocation

use std::ops::RangeInclusive;

use rand::Rng;

use crate::protocol::PortPair;

/// Draws local RTP/RTCP port pairs and synchronization sources
///
/// RTP ports are even and RTCP is always RTP + 1, both inside the range.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    range: RangeInclusive<u16>,
}

impl PortAllocator {
    pub fn new(range: RangeInclusive<u16>) -> Self {
        Self { range }
    }

    /// Pick a random even port pair
    pub fn allocate(&self) -> PortPair {
        // Halves of even ports whose RTCP neighbour still fits in u16
        const MAX_HALF: u16 = u16::MAX / 2;

        let low = self.range.start().div_ceil(2).min(MAX_HALF);
        let high = (self.range.end().saturating_sub(1) / 2).clamp(low, MAX_HALF);

        let rtp = rand::thread_rng().gen_range(low..=high) * 2;
        PortPair::new(rtp, rtp + 1)
    }

    /// Pick a random synchronization source
    pub fn ssrc(&self) -> u32 {
        rand::thread_rng().gen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_are_even_and_in_range() {
        let ports = PortAllocator::new(5001..=5010);

        for _ in 0..200 {
            let pair = ports.allocate();
            assert_eq!(pair.rtp % 2, 0);
            assert_eq!(pair.rtcp, pair.rtp + 1);
            assert!(pair.rtp >= 5002);
            assert!(pair.rtcp <= 5010);
        }
    }

    #[test]
    fn test_single_pair_range() {
        let ports = PortAllocator::new(6000..=6001);
        assert_eq!(ports.allocate(), PortPair::new(6000, 6001));
    }

    #[test]
    fn test_top_of_port_space() {
        let ports = PortAllocator::new(65535..=65535);
        assert_eq!(ports.allocate(), PortPair::new(65534, 65535));

        let ports = PortAllocator::new(65000..=u16::MAX);
        for _ in 0..200 {
            let pair = ports.allocate();
            assert!(pair.rtp >= 65000);
            assert_eq!(pair.rtcp, pair.rtp + 1);
        }
    }
}
