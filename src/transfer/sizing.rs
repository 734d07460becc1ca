//! Range-size calculation (spec §4.9): how wide a slice of a file each
//! concurrent range task gets.

/// 8 MiB. Default `WorkerOptions::buffer_size` and the rounding unit for
/// `calculate_range_size`.
pub const BUFFER_SIZE: u64 = 8 * 1024 * 1024;

/// 32 MiB. No range task is ever handed a narrower slice than this.
pub const MINIMUM_RANGE_SIZE: u64 = 32 * 1024 * 1024;

/// Picks a per-task range width such that `threads` tasks of that width
/// cover `size` bytes, rounded up to a multiple of [`BUFFER_SIZE`] and
/// clamped to at least [`MINIMUM_RANGE_SIZE`].
pub fn calculate_range_size(size: u64, threads: u64) -> u64 {
    let threads = threads.max(1);
    let mut r = size / threads;
    r = round_up(r, BUFFER_SIZE);
    r = r.max(MINIMUM_RANGE_SIZE);
    while r.saturating_mul(threads) < size {
        r += BUFFER_SIZE;
    }
    r
}

fn round_up(v: u64, unit: u64) -> u64 {
    if v == 0 {
        return 0;
    }
    ((v + unit - 1) / unit) * unit
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S4 — range sizing. The worked example's prose ("quotient 256 MiB,
    /// already aligned, product 1024 MiB >= 1024 MiB holds") describes a
    /// quotient that needs no rounding bump, so the result is 256 MiB.
    #[test]
    fn s4_range_sizing_examples() {
        assert_eq!(calculate_range_size(100 * 1024 * 1024, 4), MINIMUM_RANGE_SIZE);

        let gib = 1024 * 1024 * 1024u64;
        assert_eq!(calculate_range_size(gib, 4), 256 * 1024 * 1024);
    }

    #[quickcheck_macros::quickcheck]
    fn property_8_range_size_covers_and_is_aligned(size: u64, threads: u8) -> quickcheck::TestResult {
        if size == 0 || threads == 0 {
            return quickcheck::TestResult::discard();
        }
        let threads = threads as u64;
        let r = calculate_range_size(size, threads);
        let covers = r.saturating_mul(threads) >= size;
        let aligned = r % BUFFER_SIZE == 0;
        let floor = r >= MINIMUM_RANGE_SIZE;
        quickcheck::TestResult::from_bool(covers && aligned && floor)
    }
}
