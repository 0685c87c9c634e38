//! Daily blocked-ad counter with day-rollover reset.
//!
//! Every read path applies the same invariant: when the stored reset date is
//! not today, the count starts over. Concurrent increments from separate
//! contexts are last-write-wins; the storage area has no atomic
//! read-modify-write, and the resulting undercount is accepted.

use anyhow::Result;
use chrono::Local;
use serde_json::json;

use crate::host::{LocalStore, KEY_ADS_BLOCKED, KEY_LAST_RESET};

/// Locale date form used as the rollover marker, e.g. "Mon Aug 25 2026".
pub fn today_string() -> String {
    Local::now().format("%a %b %d %Y").to_string()
}

/// Read the count, resetting it first when the day has changed.
pub fn load_with_rollover(store: &LocalStore, today: &str) -> Result<u64> {
    if store.get_string(KEY_LAST_RESET).as_deref() != Some(today) {
        store.set_many(&[(KEY_ADS_BLOCKED, json!(0)), (KEY_LAST_RESET, json!(today))])?;
        return Ok(0);
    }
    Ok(store.get_u64(KEY_ADS_BLOCKED).unwrap_or(0))
}

/// Count one more blocked ad; a stale reset date restarts the count at 1.
pub fn increment(store: &LocalStore, today: &str) -> Result<u64> {
    if store.get_string(KEY_LAST_RESET).as_deref() != Some(today) {
        store.set_many(&[(KEY_ADS_BLOCKED, json!(1)), (KEY_LAST_RESET, json!(today))])?;
        return Ok(1);
    }
    let next = store.get_u64(KEY_ADS_BLOCKED).unwrap_or(0) + 1;
    store.set(KEY_ADS_BLOCKED, json!(next))?;
    Ok(next)
}

/// Maintenance path: reset without reading the count back. Returns whether a
/// reset happened.
pub fn reset_if_stale(store: &LocalStore, today: &str) -> Result<bool> {
    if store.get_string(KEY_LAST_RESET).as_deref() == Some(today) {
        return Ok(false);
    }
    store.set_many(&[(KEY_ADS_BLOCKED, json!(0)), (KEY_LAST_RESET, json!(today))])?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const YESTERDAY: &str = "Sun Aug 24 2025";
    const TODAY: &str = "Mon Aug 25 2025";

    fn store_with(count: u64, last_reset: &str) -> LocalStore {
        let store = LocalStore::in_memory();
        store
            .set_many(&[
                (KEY_ADS_BLOCKED, json!(count)),
                (KEY_LAST_RESET, json!(last_reset)),
            ])
            .unwrap();
        store
    }

    #[test]
    fn read_path_resets_stale_count_to_zero() {
        let store = store_with(7, YESTERDAY);
        assert_eq!(load_with_rollover(&store, TODAY).unwrap(), 0);
        assert_eq!(store.get_string(KEY_LAST_RESET).as_deref(), Some(TODAY));
    }

    #[test]
    fn read_path_keeps_todays_count() {
        let store = store_with(7, TODAY);
        assert_eq!(load_with_rollover(&store, TODAY).unwrap(), 7);
    }

    #[test]
    fn increment_restarts_at_one_after_rollover() {
        let store = store_with(7, YESTERDAY);
        assert_eq!(increment(&store, TODAY).unwrap(), 1);
        assert_eq!(store.get_u64(KEY_ADS_BLOCKED), Some(1));
        assert_eq!(store.get_string(KEY_LAST_RESET).as_deref(), Some(TODAY));
    }

    #[test]
    fn increment_counts_up_within_the_same_day() {
        let store = store_with(7, TODAY);
        assert_eq!(increment(&store, TODAY).unwrap(), 8);
    }

    #[test]
    fn increment_from_empty_store_starts_at_one() {
        let store = LocalStore::in_memory();
        assert_eq!(increment(&store, TODAY).unwrap(), 1);
    }

    #[test]
    fn maintenance_reset_is_idempotent() {
        let store = store_with(7, YESTERDAY);
        assert!(reset_if_stale(&store, TODAY).unwrap());
        assert!(!reset_if_stale(&store, TODAY).unwrap());
        assert_eq!(store.get_u64(KEY_ADS_BLOCKED), Some(0));
    }
}
