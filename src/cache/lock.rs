use std::sync::LockResult;

use tracing::warn;

/// Take the guard out of a lock result, recovering from poisoning.
///
/// Store maps are only mutated through single calls on `LruCache`/`HashMap`,
/// so a panicking holder never leaves them half-updated.
pub(crate) fn recover<G>(result: LockResult<G>, op: &'static str) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(
            op,
            target_module = "cache::store",
            result = "poisoned_recovered",
            "Recovered from poisoned store lock"
        );
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn poisoned_guard_is_returned() {
        let lock = Mutex::new(1_u32);
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = lock.lock().expect("first lock succeeds");
            panic!("poison the lock");
        }));

        assert!(lock.is_poisoned());
        *recover(lock.lock(), "test") += 1;
        assert_eq!(*recover(lock.lock(), "test"), 2);
    }
}
