//! Measurement points.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named, tagged, timestamped numeric measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Measurement name (e.g., "cpu.User").
    pub name: String,
    /// Tags identifying the series.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Measured value.
    pub value: f64,
    /// Sample time (UTC).
    pub time: DateTime<Utc>,
}

impl Point {
    /// Create an untagged point sampled now.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            tags: BTreeMap::new(),
            value,
            time: Utc::now(),
        }
    }

    /// Add a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Set the sample time.
    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    /// Insert a tag unless the point already carries one with that key.
    pub fn tag_if_absent(&mut self, key: &str, value: &str) {
        if !self.tags.contains_key(key) {
            self.tags.insert(key.to_string(), value.to_string());
        }
    }
}

/// Round `value` to `places` decimal places.
pub fn round(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
