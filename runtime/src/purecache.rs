use std::cell::RefCell;

/// Fixed capacity of the per-thread pure-function result cache (§9 "arena +
/// index mapping"). Sized to avoid allocation on the hot path; entries
/// beyond capacity simply evict the slot they collide into.
const CAPACITY: usize = 1024;

#[derive(Clone, Copy)]
struct Slot {
    key: u64,
    arg1: i64,
    arg2: Option<i64>,
    result: i64,
}

thread_local! {
    static CACHE: RefCell<Vec<Option<Slot>>> = RefCell::new(vec![None; CAPACITY]);
}

fn hash_key(function_name: &str, arg1: i64, arg2: Option<i64>) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    function_name.hash(&mut hasher);
    arg1.hash(&mut hasher);
    arg2.hash(&mut hasher);
    hasher.finish()
}

/// Looks up the last observed result for `(function_name, arg1, arg2)`.
/// Records the call before returning, evicting whatever previously lived in
/// that slot. Returns the prior cached result, if the slot held one for the
/// exact same key (a direct-mapped hit) — distinct from "no prior call" and
/// from "slot held a different key", both of which return `None`.
pub fn check_and_update(
    function_name: &str,
    arg1: i64,
    arg2: Option<i64>,
    observed: i64,
) -> Option<i64> {
    let key = hash_key(function_name, arg1, arg2);
    let index = (key as usize) % CAPACITY;

    CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        let prior = cache[index].and_then(|slot| {
            if slot.key == key && slot.arg1 == arg1 && slot.arg2 == arg2 {
                Some(slot.result)
            } else {
                None
            }
        });
        cache[index] = Some(Slot {
            key,
            arg1,
            arg2,
            result: observed,
        });
        prior
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_has_no_prior_result() {
        assert_eq!(check_and_update("f_unique_1", 1, None, 10), None);
    }

    #[test]
    fn repeated_call_returns_prior_result() {
        assert_eq!(check_and_update("f_unique_2", 1, Some(2), 42), None);
        assert_eq!(check_and_update("f_unique_2", 1, Some(2), 42), Some(42));
    }

    #[test]
    fn disagreeing_result_is_detectable() {
        check_and_update("f_unique_3", 5, None, 7);
        let prior = check_and_update("f_unique_3", 5, None, 8);
        assert_eq!(prior, Some(7));
    }
}
