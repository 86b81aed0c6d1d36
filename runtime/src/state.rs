use once_cell::sync::OnceCell;

use crate::config::RuntimeConfig;
use crate::dedup::DedupSet;
use crate::emit::Emitter;
use crate::loopcounters::LoopCounters;

/// Everything the callback surface needs, wired together exactly once per
/// process (§9 "no re-initialization paths" — there is no API to tear this
/// down and rebuild it).
pub struct RuntimeState {
    pub config: RuntimeConfig,
    pub dedup: DedupSet,
    pub loop_counters: LoopCounters,
    pub emitter: Emitter,
}

static STATE: OnceCell<RuntimeState> = OnceCell::new();

/// Returns the global runtime state, performing one-shot initialization on
/// first call. Every callback entry point routes through this before
/// touching any shared structure.
pub fn global() -> &'static RuntimeState {
    STATE.get_or_init(|| {
        let config = RuntimeConfig::from_env();
        let emitter = Emitter::spawn(config.clone());
        RuntimeState {
            config,
            dedup: DedupSet::new(),
            loop_counters: LoopCounters::new(),
            emitter,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_is_idempotent() {
        let a = global() as *const RuntimeState;
        let b = global() as *const RuntimeState;
        assert_eq!(a, b);
    }
}
