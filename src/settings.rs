use serde::{Deserialize, Serialize};

use crate::host::{LocalStore, KEY_ENABLED, KEY_SMART_DETECTION};

/// User-facing toggles. `smart_detection` is stored and served over the
/// message bus but the detection guards never read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub enabled: bool,
    pub smart_detection: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            smart_detection: true,
        }
    }
}

impl Settings {
    /// Reads stored settings, substituting the defaults for anything missing
    /// or unreadable. Storage trouble is never surfaced past this point.
    pub fn load(store: &LocalStore) -> Self {
        let defaults = Self::default();
        Self {
            enabled: store.get_bool(KEY_ENABLED).unwrap_or(defaults.enabled),
            smart_detection: store
                .get_bool(KEY_SMART_DETECTION)
                .unwrap_or(defaults.smart_detection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let store = LocalStore::in_memory();
        assert_eq!(Settings::load(&store), Settings::default());
    }

    #[test]
    fn stored_values_win_over_defaults() {
        let store = LocalStore::in_memory();
        store.set(KEY_ENABLED, json!(false)).unwrap();
        let settings = Settings::load(&store);
        assert!(!settings.enabled);
        assert!(settings.smart_detection);
    }
}
