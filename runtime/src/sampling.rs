use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

thread_local! {
    static RNG: Cell<SplitMix64> = Cell::new(SplitMix64::seeded());
}

/// A small, fast, reentrant PRNG — SplitMix64. Each thread owns one,
/// seeded once from wall-clock time, thread identity, and a stack-address
/// salt (§4.2), so no thread ever shares generator state with another.
#[derive(Clone, Copy)]
struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    fn seeded() -> Self {
        let time_salt = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let thread_salt = hash_thread_id(std::thread::current().id());
        // A stack address is a cheap, thread-distinguishing salt: two
        // threads never observe the same local variable's address.
        let stack_marker = 0u8;
        let stack_salt = &stack_marker as *const u8 as u64;
        Self {
            state: time_salt ^ thread_salt.rotate_left(21) ^ stack_salt.rotate_left(13),
        }
    }

    /// Returns the next 64-bit output. The full `u64` range is significant:
    /// callers must scale by `u64::MAX`, not by some smaller assumed range,
    /// or the effective maximum sampling rate silently clamps below 1.0.
    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E3779B97F4A7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }
}

fn hash_thread_id(id: std::thread::ThreadId) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    id.hash(&mut hasher);
    hasher.finish()
}

/// Returns a uniform sample in `[0, 1)` using the generator's true output
/// range — see [`SplitMix64::next_u64`].
fn uniform_unit() -> f64 {
    RNG.with(|cell| {
        let mut rng = cell.get();
        let raw = rng.next_u64();
        cell.set(rng);
        (raw as f64) / (u64::MAX as f64 + 1.0)
    })
}

/// Returns true with probability `rate`, independent of deduplication.
/// `rate` is assumed already clamped to `[0, 1]` by [`crate::config`].
pub fn should_sample(rate: f64) -> bool {
    if rate <= 0.0 {
        return false;
    }
    if rate >= 1.0 {
        return true;
    }
    uniform_unit() < rate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_zero_never_samples() {
        for _ in 0..1000 {
            assert!(!should_sample(0.0));
        }
    }

    #[test]
    fn rate_one_always_samples() {
        for _ in 0..1000 {
            assert!(should_sample(1.0));
        }
    }

    #[test]
    fn empirical_rate_converges() {
        let rate = 0.3;
        let trials = 200_000;
        let hits = (0..trials).filter(|_| should_sample(rate)).count();
        let empirical = hits as f64 / trials as f64;
        assert!(
            (empirical - rate).abs() < 0.02,
            "empirical={empirical} expected={rate}"
        );
    }

    #[test]
    fn uniform_unit_never_reaches_one() {
        for _ in 0..100_000 {
            assert!(uniform_unit() < 1.0);
        }
    }
}
