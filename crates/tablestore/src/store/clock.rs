use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

static LAST_STAMP: AtomicI64 = AtomicI64::new(i64::MIN);

/// Wall-clock time, strictly increasing across calls within the process.
///
/// Two mutations issued back to back must never carry the same `updatedAt`,
/// even when the system clock has not advanced between them.
pub(crate) fn now() -> DateTime<Utc> {
    let wall = Utc::now();
    let Some(nanos) = wall.timestamp_nanos_opt() else {
        return wall;
    };

    let mut last = LAST_STAMP.load(Ordering::Relaxed);
    loop {
        let next = nanos.max(last.saturating_add(1));
        match LAST_STAMP.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return DateTime::from_timestamp_nanos(next),
            Err(actual) => last = actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_strictly_increasing() {
        let stamps: Vec<_> = (0..1000).map(|_| now()).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }
}
