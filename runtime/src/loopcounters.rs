use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Loop iterations past which a loop is considered suspicious (§4.1).
pub const THRESHOLD: u64 = 10_000_000;

struct LoopCounter {
    count: AtomicU64,
    reported: AtomicBool,
}

/// Global, per-loop-header iteration counters. Lifecycled once per process
/// (§9 "no re-initialization paths") and reset only by restarting the
/// process — per-function reset only applies to the instrumentation
/// engine's own compile-time bookkeeping, not this runtime table.
pub struct LoopCounters {
    counters: RwLock<HashMap<u64, Arc<LoopCounter>>>,
}

impl LoopCounters {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
        }
    }

    fn counter_for(&self, loop_id: u64) -> Arc<LoopCounter> {
        if let Some(counter) = self.counters.read().unwrap().get(&loop_id) {
            return counter.clone();
        }
        let mut counters = self.counters.write().unwrap();
        counters
            .entry(loop_id)
            .or_insert_with(|| {
                Arc::new(LoopCounter {
                    count: AtomicU64::new(0),
                    reported: AtomicBool::new(false),
                })
            })
            .clone()
    }

    /// Increments the counter for `loop_id`. Returns `Some(iterations)`
    /// exactly once per counter, the call on which it first crosses
    /// [`THRESHOLD`] — correct under arbitrary concurrent callers because
    /// the crossing test is a single `compare_exchange` on `reported`.
    pub fn tick(&self, loop_id: u64) -> Option<u64> {
        let counter = self.counter_for(loop_id);
        let iterations = counter.count.fetch_add(1, Ordering::SeqCst) + 1;
        if iterations >= THRESHOLD
            && counter
                .reported
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            return Some(iterations);
        }
        None
    }
}

impl Default for LoopCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;
    use std::thread;

    #[test]
    fn fires_exactly_once_under_single_thread() {
        let counters = LoopCounters::new();
        let mut fires = 0;
        for _ in 0..THRESHOLD + 10 {
            if counters.tick(1).is_some() {
                fires += 1;
            }
        }
        assert_eq!(fires, 1);
    }

    #[test]
    fn fires_exactly_once_under_concurrency() {
        let counters = StdArc::new(LoopCounters::new());
        let per_thread = THRESHOLD / 4 + 10;
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counters = counters.clone();
                thread::spawn(move || {
                    let mut fires = 0;
                    for _ in 0..per_thread {
                        if counters.tick(7).is_some() {
                            fires += 1;
                        }
                    }
                    fires
                })
            })
            .collect();
        let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn distinct_loops_have_independent_counters() {
        let counters = LoopCounters::new();
        for _ in 0..5 {
            assert!(counters.tick(1).is_none());
        }
        assert!(counters.tick(2).is_none());
    }
}
