//! Cache entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Optional request dimensions folded into a cache key.
///
/// Field order here is the order in which dimensions are appended to a key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
}

impl Dimensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, value: impl Into<String>) -> Self {
        self.category = Some(value.into());
        self
    }

    pub fn period(mut self, value: impl Into<String>) -> Self {
        self.period = Some(value.into());
        self
    }

    pub fn kind(mut self, value: impl Into<String>) -> Self {
        self.kind = Some(value.into());
        self
    }

    pub fn filter(mut self, value: impl Into<String>) -> Self {
        self.filter = Some(value.into());
        self
    }

    pub fn day(mut self, value: impl Into<String>) -> Self {
        self.day = Some(value.into());
        self
    }

    /// Present dimensions as `(name, value)` pairs in key order.
    pub fn present(&self) -> Vec<(&'static str, &str)> {
        [
            ("category", &self.category),
            ("period", &self.period),
            ("type", &self.kind),
            ("filter", &self.filter),
            ("day", &self.day),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
        .collect()
    }

    /// Look a dimension up by its wire name.
    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            "category" => self.category.as_deref(),
            "period" => self.period.as_deref(),
            "type" => self.kind.as_deref(),
            "filter" => self.filter.as_deref(),
            "day" => self.day.as_deref(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.present().is_empty()
    }
}

/// One stored cache row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub cache_key: String,
    pub provider: String,
    pub endpoint: String,
    pub category: Option<String>,
    pub period: Option<String>,
    pub payload: Value,
    pub result_count: i64,
    pub fetch_count: i64,
    pub refresh_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl CacheEntry {
    /// An entry is readable while `now < expires_at`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// A fully computed write, ready for the repository's atomic upsert.
#[derive(Debug, Clone)]
pub struct UpsertRecord {
    pub cache_key: String,
    pub provider: String,
    pub endpoint: String,
    pub category: Option<String>,
    pub period: Option<String>,
    pub payload: Value,
    pub result_count: i64,
    pub expires_at: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

/// Aggregates for one provider/endpoint pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointStats {
    pub provider: String,
    pub endpoint: String,
    pub total_entries: i64,
    pub valid_entries: i64,
    pub expired_entries: i64,
    pub total_items: i64,
    pub total_fetches: i64,
    pub avg_refresh_count: f64,
    pub oldest_update: Option<DateTime<Utc>>,
    pub newest_update: Option<DateTime<Utc>>,
}

/// Roll-up over the whole table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_entries: i64,
    pub valid_entries: i64,
    pub expired_entries: i64,
    pub total_items: i64,
    pub total_fetches: i64,
    pub accessed_last_24h: i64,
}

/// Cache statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub endpoints: Vec<EndpointStats>,
    pub totals: GlobalStats,
}

/// Typed view over a cached payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub provider: String,
    pub endpoint: String,
    #[serde(default)]
    pub dimensions: Dimensions,
    pub items: Vec<Value>,
    pub fetched_at: DateTime<Utc>,
}

/// Keys under which upstreams commonly nest their result list.
const LIST_FIELDS: [&str; 4] = ["data", "results", "items", "list"];

/// Cardinality of a payload: array length, nested list length, or 1 for a
/// single object.
pub fn result_count(payload: &Value) -> i64 {
    match payload {
        Value::Null => 0,
        Value::Array(items) => items.len() as i64,
        Value::Object(map) => LIST_FIELDS
            .iter()
            .find_map(|field| map.get(*field).and_then(Value::as_array))
            .map(|items| items.len() as i64)
            .unwrap_or(1),
        _ => 1,
    }
}
