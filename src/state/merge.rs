//! Validate-and-merge of a raw (possibly partial or stale) document onto defaults.
//!
//! Every read path goes through `merge`, so callers always see a complete state:
//! - object sections are overlaid key by key; a key whose value does not fit the
//!   typed field keeps the default value
//! - record arrays are taken as stored (undecodable items dropped), capped to their limits

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use super::types::{AppState, MAX_CONVERSATIONS, MAX_RECENT_MESSAGES};

/// Merge `raw` over `defaults`.
///
/// `merge(merge(x)) == merge(x)` holds for any `x`: the output serializes to a
/// document in which every key is present and valid.
pub fn merge(raw: &Value, defaults: &AppState) -> AppState {
    let section = |name: &str| raw.as_object().and_then(|obj| obj.get(name));

    AppState {
        config: merge_section("config", section("config"), &defaults.config),
        user_preferences: merge_section(
            "userPreferences",
            section("userPreferences"),
            &defaults.user_preferences,
        ),
        tavus_settings: merge_section(
            "tavusSettings",
            section("tavusSettings"),
            &defaults.tavus_settings,
        ),
        conversations: merge_records("conversations", section("conversations"), MAX_CONVERSATIONS),
        recent_messages: merge_records(
            "recentMessages",
            section("recentMessages"),
            MAX_RECENT_MESSAGES,
        ),
    }
}

fn merge_section<T>(name: &str, raw: Option<&Value>, default: &T) -> T
where
    T: Serialize + DeserializeOwned + Clone,
{
    let Some(Value::Object(raw)) = raw else {
        return default.clone();
    };
    let Ok(Value::Object(mut merged)) = serde_json::to_value(default) else {
        return default.clone();
    };

    for (key, value) in raw {
        let previous = merged.insert(key.clone(), value.clone());
        if decode::<T>(&merged).is_none() {
            warn!(section = name, key = %key, "Discarding invalid stored value, using default");
            restore(&mut merged, key, previous);
        }
    }

    decode(&merged).unwrap_or_else(|| default.clone())
}

fn decode<T: DeserializeOwned>(obj: &Map<String, Value>) -> Option<T> {
    serde_json::from_value(Value::Object(obj.clone())).ok()
}

fn restore(obj: &mut Map<String, Value>, key: &str, previous: Option<Value>) {
    match previous {
        Some(value) => {
            obj.insert(key.to_string(), value);
        }
        None => {
            obj.remove(key);
        }
    }
}

fn merge_records<T: DeserializeOwned>(name: &str, raw: Option<&Value>, cap: usize) -> Vec<T> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let Some(items) = raw.as_array() else {
        warn!(section = name, "Stored section is not an array, starting empty");
        return Vec::new();
    };

    let mut records = Vec::with_capacity(items.len().min(cap));
    for (index, item) in items.iter().enumerate() {
        if records.len() == cap {
            warn!(section = name, dropped = items.len() - index, "Stored records exceed limit");
            break;
        }
        match serde_json::from_value::<T>(item.clone()) {
            Ok(record) => records.push(record),
            Err(e) => warn!(section = name, index, "Dropping undecodable record: {}", e),
        }
    }
    records
}
