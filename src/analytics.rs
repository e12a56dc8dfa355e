//! Chart series consumed from the analytics service and the per-slot memo
//! cache in front of it.
//!
//! Series are opaque to this engine: it never recomputes aggregates locally,
//! it only caches them per slot index and fixes a presentation order for the
//! legend. The cache is cleared whenever the governing category starts a new
//! batch, never per entry.

use std::collections::HashMap;
use std::future::Future;

use rand::seq::SliceRandom;
use serde::Deserialize;

use crate::slot::Row;
use crate::upload::IngestError;

/// Label/value pairs for line and bar charts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// One pie slice: label, value, and percentage of the whole.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Slice {
    pub label: String,
    pub value: f64,
    pub percent: f64,
}

/// Categorical percentage breakdown for pie charts.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Breakdown {
    pub slices: Vec<Slice>,
}

/// All chart series for one slot. Every entry is optional: a series the
/// service omitted, errored on, or sent malformed simply has no chart to
/// display.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChartBundle {
    pub line: Option<Series>,
    pub bar: Option<Series>,
    pub pies: Vec<Breakdown>,
}

impl ChartBundle {
    pub fn is_empty(&self) -> bool {
        self.line.is_none() && self.bar.is_none() && self.pies.is_empty()
    }

    /// Distinct slice labels across all pies, in first-seen order.
    fn pie_labels(&self) -> Vec<String> {
        let mut labels = Vec::new();
        for pie in &self.pies {
            for slice in &pie.slices {
                if !labels.contains(&slice.label) {
                    labels.push(slice.label.clone());
                }
            }
        }
        labels
    }
}

/// Wire shape of a label/value series. `labels`/`values` may be absent or of
/// mismatched length, or the service may have sent `{"error": ...}` instead;
/// all of those collapse to "no chart".
#[derive(Debug, Default, Deserialize)]
pub struct SeriesPayload {
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub values: Option<Vec<f64>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SeriesPayload {
    /// Tolerant conversion: mismatched lengths are truncated to the shorter
    /// side, empty or errored payloads yield `None`.
    pub fn into_series(self) -> Option<Series> {
        if self.error.is_some() {
            return None;
        }
        let (mut labels, mut values) = (self.labels?, self.values?);
        let len = labels.len().min(values.len());
        if len == 0 {
            return None;
        }
        labels.truncate(len);
        values.truncate(len);
        Some(Series { labels, values })
    }
}

/// Remote analytics call for one slot's data, treated as a pure function of
/// `(rows, columns)`.
pub trait AnalyticsClient: Clone + Send + Sync + 'static {
    fn charts(
        &self,
        columns: &[String],
        rows: &[Row],
    ) -> impl Future<Output = Result<ChartBundle, IngestError>> + Send;
}

/// `AnalyticsClient` over HTTP: posts `{columns, data}` to
/// `{base_url}/charts` and tolerantly decodes the bundle.
#[derive(Clone, Debug)]
pub struct HttpAnalyticsClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAnalyticsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct BundlePayload {
    #[serde(default)]
    line: Option<SeriesPayload>,
    #[serde(default)]
    bar: Option<SeriesPayload>,
    #[serde(default)]
    pies: Vec<PiePayload>,
}

#[derive(Debug, Default, Deserialize)]
struct PiePayload {
    #[serde(default)]
    slices: Option<Vec<Slice>>,
    #[serde(default)]
    error: Option<String>,
}

impl BundlePayload {
    fn into_bundle(self) -> ChartBundle {
        ChartBundle {
            line: self.line.and_then(SeriesPayload::into_series),
            bar: self.bar.and_then(SeriesPayload::into_series),
            pies: self
                .pies
                .into_iter()
                .filter(|p| p.error.is_none())
                .filter_map(|p| p.slices)
                .filter(|slices| !slices.is_empty())
                .map(|slices| Breakdown { slices })
                .collect(),
        }
    }
}

impl AnalyticsClient for HttpAnalyticsClient {
    async fn charts(&self, columns: &[String], rows: &[Row]) -> Result<ChartBundle, IngestError> {
        let url = format!("{}/charts", self.base_url);
        let body = serde_json::json!({ "columns": columns, "data": rows });
        let payload: BundlePayload = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(payload.into_bundle())
    }
}

/// One cached analytics result: the bundle plus the legend order fixed at
/// first computation so re-renders of the same slot are stable.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalyticsEntry {
    pub bundle: ChartBundle,
    pub legend_order: Vec<String>,
}

impl AnalyticsEntry {
    /// Shuffle the pie legend once; the order is part of the cached entry.
    pub fn new(bundle: ChartBundle) -> Self {
        let mut legend_order = bundle.pie_labels();
        legend_order.shuffle(&mut rand::thread_rng());
        Self {
            bundle,
            legend_order,
        }
    }
}

/// Memoized chart bundles keyed by slot index. Entries are only ever
/// invalidated all at once, when a new batch starts in the governing
/// category.
#[derive(Debug, Default)]
pub struct AnalyticsCache {
    entries: HashMap<usize, AnalyticsEntry>,
}

impl AnalyticsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot_index: usize) -> Option<&AnalyticsEntry> {
        self.entries.get(&slot_index)
    }

    pub fn insert(&mut self, slot_index: usize, entry: AnalyticsEntry) {
        self.entries.insert(slot_index, entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(pairs: &[(&str, f64)]) -> Series {
        Series {
            labels: pairs.iter().map(|(l, _)| l.to_string()).collect(),
            values: pairs.iter().map(|(_, v)| *v).collect(),
        }
    }

    fn pie(labels: &[&str]) -> Breakdown {
        Breakdown {
            slices: labels
                .iter()
                .map(|l| Slice {
                    label: l.to_string(),
                    value: 1.0,
                    percent: 25.0,
                })
                .collect(),
        }
    }

    #[test]
    fn short_arrays_truncate_to_common_length() {
        let payload = SeriesPayload {
            labels: Some(vec!["a".into(), "b".into(), "c".into()]),
            values: Some(vec![1.0, 2.0]),
            error: None,
        };
        let s = payload.into_series().unwrap();
        assert_eq!(s, series(&[("a", 1.0), ("b", 2.0)]));
    }

    #[test]
    fn absent_or_errored_series_become_no_chart() {
        assert!(SeriesPayload::default().into_series().is_none());
        let payload = SeriesPayload {
            labels: Some(vec!["a".into()]),
            values: Some(vec![1.0]),
            error: Some("Missing required column".into()),
        };
        assert!(payload.into_series().is_none());
        let payload = SeriesPayload {
            labels: Some(vec![]),
            values: Some(vec![]),
            error: None,
        };
        assert!(payload.into_series().is_none());
    }

    #[test]
    fn bundle_payload_drops_malformed_pies() {
        let payload: BundlePayload = serde_json::from_str(
            r#"{
                "line": {"labels": ["x"], "values": [1.0]},
                "pies": [
                    {"slices": [{"label": "a", "value": 2.0, "percent": 100.0}]},
                    {"error": "Missing required column"},
                    {"slices": []}
                ]
            }"#,
        )
        .unwrap();
        let bundle = payload.into_bundle();
        assert_eq!(bundle.line, Some(series(&[("x", 1.0)])));
        assert!(bundle.bar.is_none());
        assert_eq!(bundle.pies.len(), 1);
    }

    #[test]
    fn legend_order_is_fixed_at_entry_creation() {
        let bundle = ChartBundle {
            line: None,
            bar: None,
            pies: vec![pie(&["a", "b"]), pie(&["b", "c"])],
        };
        let entry = AnalyticsEntry::new(bundle);
        let mut sorted = entry.legend_order.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["a", "b", "c"]);
        // The entry is a plain value; re-reading it never reshuffles.
        let again = entry.clone();
        assert_eq!(entry.legend_order, again.legend_order);
    }

    #[test]
    fn cache_is_cleared_in_full() {
        let mut cache = AnalyticsCache::new();
        cache.insert(0, AnalyticsEntry::new(ChartBundle::default()));
        cache.insert(2, AnalyticsEntry::new(ChartBundle::default()));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(0).is_some());
        assert!(cache.get(1).is_none());
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(0).is_none());
    }
}
