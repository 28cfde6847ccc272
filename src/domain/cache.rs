//! Memoization of per-window optimization results.
//!
//! A key holds only the ticker set and date range of a window. The weights
//! also depend on the optimizer configuration and on the prices themselves,
//! so one cache serves one optimizer configuration over one price source.
//! Engines with different settings need separate caches.

use crate::domain::series::{PriceSeries, WeightVector};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub tickers: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WindowKey {
    /// `None` for an empty window.
    pub fn for_window(window: &PriceSeries) -> Option<Self> {
        let dates = window.dates();
        Some(Self {
            tickers: window.tickers().to_vec(),
            start: *dates.first()?,
            end: *dates.last()?,
        })
    }
}

/// Window weights for a single optimizer configuration and price source.
/// Sharing one between differently configured engines returns stale weights.
#[derive(Debug, Default)]
pub struct WindowCache {
    entries: Mutex<HashMap<WindowKey, WeightVector>>,
}

impl WindowCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &WindowKey) -> Option<WeightVector> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    pub fn insert(&self, key: WindowKey, weights: WeightVector) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key, weights);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}
