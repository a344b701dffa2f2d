use std::sync::atomic::{AtomicI64, Ordering};

use mongodb::bson::DateTime;

static LAST_ISSUED_MILLIS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Current time for server-assigned timestamps.
///
/// Never returns the same or an earlier millisecond twice within a process:
/// when the wall clock hasn't moved past the last issued value, the next
/// millisecond is handed out instead.
pub fn monotonic_now() -> DateTime {
    let now = chrono::Utc::now().timestamp_millis();
    let previous = LAST_ISSUED_MILLIS
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
            Some(now.max(last.saturating_add(1)))
        })
        .unwrap_or(now); // closure always returns Some

    DateTime::from_millis(now.max(previous.saturating_add(1)))
}
