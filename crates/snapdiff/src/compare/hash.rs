/// Running fingerprint of where mismatches occur.
///
/// Each mismatch at `(x, y)` maps to `key = y * spread + x`. The first one
/// seeds the hash with `spread` and becomes `start`; every later one adds
/// `key - start`. Zero means no mismatch was recorded. Not a cryptographic
/// digest: collisions are possible and acceptable.
pub struct PositionalHash {
    spread: u64,
    start: Option<u64>,
    value: u64,
}

impl PositionalHash {
    /// `spread` must exceed any row width so keys of different rows never alias.
    pub fn new(spread: u64) -> Self {
        Self {
            spread,
            start: None,
            value: 0,
        }
    }

    /// Record a mismatch. Calls must arrive in row-major order.
    pub fn record(&mut self, x: u32, y: u32) {
        let key = u64::from(y)
            .wrapping_mul(self.spread)
            .wrapping_add(u64::from(x));
        match self.start {
            None => {
                self.start = Some(key);
                self.value = self.spread;
            }
            Some(start) => {
                self.value = self.value.wrapping_add(key.wrapping_sub(start));
            }
        }
    }

    pub fn finish(&self) -> u64 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPREAD: u64 = 1_000_000;

    #[test]
    fn empty_is_zero() {
        assert_eq!(PositionalHash::new(SPREAD).finish(), 0);
    }

    #[test]
    fn first_mismatch_seeds_with_spread() {
        let mut h = PositionalHash::new(SPREAD);
        h.record(7, 3);
        assert_eq!(h.finish(), SPREAD);
    }

    #[test]
    fn later_mismatches_add_distance_from_start() {
        let mut h = PositionalHash::new(SPREAD);
        h.record(2, 0);
        h.record(5, 0);
        h.record(1, 2);
        // (5 - 2) + (2 * SPREAD + 1 - 2)
        assert_eq!(h.finish(), SPREAD + 3 + 2 * SPREAD - 1);
    }

    #[test]
    fn same_count_different_positions_differ() {
        let mut a = PositionalHash::new(SPREAD);
        a.record(0, 0);
        a.record(1, 0);
        let mut b = PositionalHash::new(SPREAD);
        b.record(0, 0);
        b.record(0, 1);
        assert_ne!(a.finish(), b.finish());
    }
}
