//! Rate limiting for log lines that would otherwise repeat on every request.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Window {
    opened_at: Instant,
    suppressed: u64,
}

static WINDOWS: OnceLock<Mutex<HashMap<&'static str, Window>>> = OnceLock::new();

/// Returns `Some(suppressed_count)` when a log for `key` should be emitted,
/// otherwise `None` and the event is counted against the open window.
///
/// Keys are static event names such as `"session.storage.read_failed"`.
pub fn should_emit(key: &'static str, interval: Duration) -> Option<u64> {
    let mut windows = WINDOWS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .expect("log throttle mutex poisoned");
    let now = Instant::now();

    match windows.get_mut(key) {
        Some(window) if now.duration_since(window.opened_at) >= interval => {
            let suppressed = window.suppressed;
            window.opened_at = now;
            window.suppressed = 0;
            Some(suppressed)
        }
        Some(window) => {
            window.suppressed += 1;
            None
        }
        None => {
            windows.insert(
                key,
                Window {
                    opened_at: now,
                    suppressed: 0,
                },
            );
            Some(0)
        }
    }
}
