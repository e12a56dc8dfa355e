//! rowdeck: batch spreadsheet upload and client-side table exploration.
//!
//! Files go to a remote processing service in parallel; each file's result
//! lands in its own slot, loading independently. The table view over any
//! slot (search, per-column filters, sort, pagination) is derived locally by
//! a pure pipeline with no further network calls, and chart series fetched
//! from the analytics service are memoized per slot.
//!
//! [`Session`] is the client-facing surface: it owns the slot store, the
//! per-slot query states, and the analytics caches, and is constructed and
//! owned explicitly by the caller.

pub mod analytics;
pub mod cli;
pub mod config;
pub mod query;
pub mod slot;
pub mod upload;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use crate::analytics::{AnalyticsCache, AnalyticsClient, AnalyticsEntry};
use crate::query::{QueryState, TablePage};
use crate::slot::{ResultSlot, SlotStore};
use crate::upload::{
    accept_selection, lock, BatchUploadCoordinator, IngestClient, IngestError, SelectionError,
    UploadFile,
};

/// Upload category lanes served by the processing service.
pub mod category {
    pub const SALESFORCE: &str = "salesforce";
    pub const CLEANED: &str = "cleaned";
    pub const COMMISSION: &str = "commission";
    pub const REFERRAL: &str = "referral";
}

/// One user's working state: slot store, upload coordinator, query states,
/// and analytics caches. Query states are keyed per (category, slot index),
/// created lazily, kept while switching between slots, and dropped when the
/// owning batch is replaced or reset.
pub struct Session<C, A> {
    store: Arc<Mutex<SlotStore>>,
    coordinator: BatchUploadCoordinator<C>,
    analytics_client: A,
    queries: HashMap<(String, usize), QueryState>,
    analytics: HashMap<String, AnalyticsCache>,
    max_files: usize,
    allowed_extensions: Vec<String>,
}

impl<C: IngestClient, A: AnalyticsClient> Session<C, A> {
    pub fn new(
        ingest_client: C,
        analytics_client: A,
        max_files: usize,
        allowed_extensions: Vec<String>,
    ) -> Self {
        let store = Arc::new(Mutex::new(SlotStore::new()));
        let coordinator = BatchUploadCoordinator::new(Arc::clone(&store), ingest_client);
        Self {
            store,
            coordinator,
            analytics_client,
            queries: HashMap::new(),
            analytics: HashMap::new(),
            max_files,
            allowed_extensions,
        }
    }

    /// Validate the selection and start a batch. The new batch supersedes
    /// any previous one in the category: its query states and analytics
    /// cache are dropped before the first upload is dispatched.
    pub fn start_batch(
        &mut self,
        category: &str,
        files: Vec<UploadFile>,
    ) -> Result<Vec<JoinHandle<()>>, SelectionError> {
        accept_selection(&files, self.max_files, &self.allowed_extensions)?;
        self.forget_category(category);
        Ok(self.coordinator.start_batch(category, files))
    }

    /// Drop the category's slots, query states, and analytics cache.
    pub fn reset(&mut self, category: &str) {
        lock(&self.store).reset(category);
        self.forget_category(category);
    }

    fn forget_category(&mut self, category: &str) {
        self.queries.retain(|(cat, _), _| cat != category);
        if let Some(cache) = self.analytics.get_mut(category) {
            cache.clear();
        }
    }

    /// Snapshot of the category's slots, in batch order.
    pub fn slots(&self, category: &str) -> Vec<ResultSlot> {
        lock(&self.store)
            .collection(category)
            .map(|c| c.slots().to_vec())
            .unwrap_or_default()
    }

    pub fn has_results(&self, category: &str) -> bool {
        lock(&self.store).has_results(category)
    }

    pub fn selected_index(&self, category: &str) -> Option<usize> {
        lock(&self.store)
            .collection(category)
            .and_then(|c| c.selected())
    }

    pub fn set_selected(&mut self, category: &str, index: usize) {
        lock(&self.store).set_selected(category, index);
    }

    /// Selected slot's snapshot, if the category has any slots.
    pub fn selected_slot(&self, category: &str) -> Option<ResultSlot> {
        lock(&self.store)
            .collection(category)
            .and_then(|c| c.selected_slot().cloned())
    }

    /// Query state for the selected slot, created with defaults on first
    /// access. `None` when the category holds no slots.
    pub fn query_mut(&mut self, category: &str) -> Option<&mut QueryState> {
        let index = self.selected_index(category)?;
        Some(
            self.queries
                .entry((category.to_string(), index))
                .or_default(),
        )
    }

    pub fn set_search(&mut self, category: &str, term: impl Into<String>) {
        if let Some(query) = self.query_mut(category) {
            query.set_search(term);
        }
    }

    pub fn toggle_sort(&mut self, category: &str, column: &str) {
        if let Some(query) = self.query_mut(category) {
            query.toggle_sort(column);
        }
    }

    pub fn set_filter(
        &mut self,
        category: &str,
        column: &str,
        values: std::collections::HashSet<String>,
    ) {
        if let Some(query) = self.query_mut(category) {
            query.set_filter(column, values);
        }
    }

    pub fn set_page(&mut self, category: &str, index: usize) {
        if let Some(query) = self.query_mut(category) {
            query.set_page(index);
        }
    }

    pub fn set_page_size(&mut self, category: &str, size: usize) {
        if let Some(query) = self.query_mut(category) {
            query.set_page_size(size);
        }
    }

    /// Render the selected slot's table page under its current query state.
    /// `None` while the slot is loading or failed.
    pub fn render(&self, category: &str) -> Option<TablePage> {
        let store = lock(&self.store);
        let collection = store.collection(category)?;
        let index = collection.selected()?;
        let data = collection.slots()[index].data()?;
        let default = QueryState::default();
        let query = self
            .queries
            .get(&(category.to_string(), index))
            .unwrap_or(&default);
        Some(query::render(data, query))
    }

    /// Column names of the selected slot's data, for table headers.
    pub fn selected_columns(&self, category: &str) -> Option<Vec<String>> {
        self.selected_slot(category)
            .and_then(|slot| slot.data().map(|d| d.columns.clone()))
    }

    /// Chart bundle for the selected slot, served from the per-category
    /// cache when the slot was already seen. A failed analytics call leaves
    /// the cache untouched so the view can retry without losing table data.
    pub async fn charts(&mut self, category: &str) -> Result<Option<AnalyticsEntry>, IngestError> {
        let (index, columns, rows) = {
            let store = lock(&self.store);
            let Some(collection) = store.collection(category) else {
                return Ok(None);
            };
            let Some(index) = collection.selected() else {
                return Ok(None);
            };
            let Some(data) = collection.slots()[index].data() else {
                return Ok(None);
            };
            (index, data.columns.clone(), data.rows.clone())
        };

        if let Some(entry) = self.analytics.get(category).and_then(|c| c.get(index)) {
            return Ok(Some(entry.clone()));
        }

        let bundle = self.analytics_client.charts(&columns, &rows).await?;
        let entry = AnalyticsEntry::new(bundle);
        self.analytics
            .entry(category.to_string())
            .or_default()
            .insert(index, entry.clone());
        Ok(Some(entry))
    }
}
