//! Endpoint volatility classes and their time-to-live table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How quickly an endpoint's data goes out of date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Volatility {
    /// Schedules, upcoming releases, airing lists.
    Volatile,
    /// Search results.
    Search,
    /// Single-item detail pages.
    Detail,
    /// Prices and offers.
    Price,
    /// Genres, reference lists and other near-constant data.
    Static,
    #[default]
    Standard,
}

impl Volatility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Volatility::Volatile => "volatile",
            Volatility::Search => "search",
            Volatility::Detail => "detail",
            Volatility::Price => "price",
            Volatility::Static => "static",
            Volatility::Standard => "standard",
        }
    }
}

impl fmt::Display for Volatility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Volatility {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "volatile" => Ok(Volatility::Volatile),
            "search" => Ok(Volatility::Search),
            "detail" => Ok(Volatility::Detail),
            "price" => Ok(Volatility::Price),
            "static" => Ok(Volatility::Static),
            "standard" => Ok(Volatility::Standard),
            other => Err(crate::Error::Config(format!("Unknown volatility: {}", other))),
        }
    }
}

/// TTL in seconds per volatility class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtlTable {
    #[serde(default = "default_ttl")]
    pub default: u64,
    #[serde(default = "default_volatile_ttl")]
    pub volatile: u64,
    #[serde(default = "default_search_ttl")]
    pub search: u64,
    #[serde(default = "default_detail_ttl")]
    pub detail: u64,
    #[serde(default = "default_price_ttl")]
    pub price: u64,
    #[serde(default = "default_static_ttl")]
    pub static_content: u64,
}

fn default_ttl() -> u64 {
    86_400
}

fn default_volatile_ttl() -> u64 {
    3_600
}

fn default_search_ttl() -> u64 {
    6 * 3_600
}

fn default_detail_ttl() -> u64 {
    7 * 86_400
}

fn default_price_ttl() -> u64 {
    12 * 3_600
}

fn default_static_ttl() -> u64 {
    30 * 86_400
}

impl Default for TtlTable {
    fn default() -> Self {
        Self {
            default: default_ttl(),
            volatile: default_volatile_ttl(),
            search: default_search_ttl(),
            detail: default_detail_ttl(),
            price: default_price_ttl(),
            static_content: default_static_ttl(),
        }
    }
}

impl TtlTable {
    /// TTL in seconds for a volatility class.
    pub fn ttl_for(&self, volatility: Volatility) -> u64 {
        match volatility {
            Volatility::Volatile => self.volatile,
            Volatility::Search => self.search,
            Volatility::Detail => self.detail,
            Volatility::Price => self.price,
            Volatility::Static => self.static_content,
            Volatility::Standard => self.default,
        }
    }
}
