//! Batch upload orchestration.
//!
//! `start_batch` replaces the category's slots with loading placeholders and
//! fans out one task per file. Each task is tagged with its original index
//! and the batch generation at dispatch time, so responses are routed to
//! exactly the slot they belong to no matter the completion order, and
//! responses from a superseded batch are dropped by the store.

use std::future::Future;
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use crate::slot::{Row, SlotState, SlotStore, TableData};

/// Shown for failures that carry no structured explanation from the service.
const GENERIC_UPLOAD_ERROR: &str = "File processing failed";

/// One file selected for upload: name plus raw bytes. How the bytes were
/// obtained (picker, disk, test fixture) is the caller's concern.
#[derive(Clone, Debug)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    fn extension(&self) -> Option<&str> {
        self.name.rsplit_once('.').map(|(_, ext)| ext)
    }
}

/// Why a file selection was rejected before any upload started.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("too many files selected: {count} (limit is {limit})")]
    TooManyFiles { count: usize, limit: usize },
    #[error("unsupported file type: {0}")]
    UnsupportedFile(String),
}

/// Acceptance policy checked before a batch starts: at most `max_files`
/// files, every extension within `allowed` (case-insensitive).
pub fn accept_selection(
    files: &[UploadFile],
    max_files: usize,
    allowed: &[String],
) -> Result<(), SelectionError> {
    if files.len() > max_files {
        return Err(SelectionError::TooManyFiles {
            count: files.len(),
            limit: max_files,
        });
    }
    for file in files {
        let ok = file
            .extension()
            .is_some_and(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)));
        if !ok {
            return Err(SelectionError::UnsupportedFile(file.name.clone()));
        }
    }
    Ok(())
}

/// Successful service response for one file.
#[derive(Clone, Debug, Deserialize)]
pub struct IngestResponse {
    pub filename: String,
    pub total_rows: usize,
    pub columns: Vec<String>,
    pub data: Vec<Row>,
}

impl From<IngestResponse> for TableData {
    fn from(resp: IngestResponse) -> Self {
        TableData {
            columns: resp.columns,
            rows: resp.data,
            total_rows: resp.total_rows,
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    /// Structured explanation from the service (`detail` payload or a plain
    /// string body).
    #[error("{0}")]
    Service(String),
    #[error("service transport failed")]
    Transport(#[from] reqwest::Error),
    #[error("malformed service response")]
    Malformed(#[from] serde_json::Error),
}

/// What ends up in a failed slot: the service's own explanation when it sent
/// one, a generic fallback otherwise.
fn slot_error_message(err: &IngestError) -> String {
    match err {
        IngestError::Service(detail) => detail.clone(),
        _ => GENERIC_UPLOAD_ERROR.to_string(),
    }
}

/// Remote ingestion call for one file. Implementations must be cheap to
/// clone; one clone rides along in each upload task.
pub trait IngestClient: Clone + Send + Sync + 'static {
    fn ingest(
        &self,
        category: &str,
        file: UploadFile,
    ) -> impl Future<Output = Result<IngestResponse, IngestError>> + Send;
}

/// `IngestClient` over HTTP: multipart POST of the file bytes to
/// `{base_url}/analyze/{category}`. Any non-2xx response becomes an error
/// outcome for the slot; a structured `{"detail": ...}` payload or plain
/// string body is surfaced as the message.
#[derive(Clone, Debug)]
pub struct HttpIngestClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpIngestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

/// Pull an error message out of a failure body: `{"detail": "..."}` or a
/// bare JSON string; anything else yields nothing.
fn error_detail(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorPayload {
        detail: String,
    }
    if let Ok(payload) = serde_json::from_str::<ErrorPayload>(body) {
        return Some(payload.detail);
    }
    serde_json::from_str::<String>(body).ok()
}

impl IngestClient for HttpIngestClient {
    async fn ingest(
        &self,
        category: &str,
        file: UploadFile,
    ) -> Result<IngestResponse, IngestError> {
        let part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.name);
        let form = reqwest::multipart::Form::new().part("file", part);
        let url = format!("{}/analyze/{}", self.base_url, category);

        let response = self.http.post(&url).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(match error_detail(&body) {
                Some(detail) => IngestError::Service(detail),
                None => IngestError::Service(GENERIC_UPLOAD_ERROR.to_string()),
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Fans a batch of files out to the ingestion service and routes each result
/// back into the shared store under the slot index it was dispatched for.
pub struct BatchUploadCoordinator<C> {
    store: Arc<Mutex<SlotStore>>,
    client: C,
}

impl<C: IngestClient> BatchUploadCoordinator<C> {
    pub fn new(store: Arc<Mutex<SlotStore>>, client: C) -> Self {
        Self { store, client }
    }

    pub fn store(&self) -> Arc<Mutex<SlotStore>> {
        Arc::clone(&self.store)
    }

    /// Replace the category's collection with loading slots and spawn one
    /// upload task per file. Returns the task handles; dropping them detaches
    /// the uploads, awaiting them observes batch completion. Every file is
    /// attempted exactly once, failures land in their own slot and never
    /// abort the batch.
    #[instrument(skip(self, files), fields(count = files.len()))]
    pub fn start_batch(&self, category: &str, files: Vec<UploadFile>) -> Vec<JoinHandle<()>> {
        let filenames = files.iter().map(|f| f.name.clone()).collect();
        let generation = lock(&self.store).begin_batch(category, filenames);

        files
            .into_iter()
            .enumerate()
            .map(|(index, file)| {
                let client = self.client.clone();
                let store = Arc::clone(&self.store);
                let category = category.to_string();
                tokio::spawn(async move {
                    debug!(category, index, file = %file.name, "upload dispatched");
                    let state = match client.ingest(&category, file).await {
                        Ok(response) => SlotState::Ready(response.into()),
                        Err(err) => SlotState::Failed(slot_error_message(&err)),
                    };
                    lock(&store).apply_result(&category, generation, index, state);
                })
            })
            .collect()
    }
}

/// Store access that survives a poisoned mutex; a panicked upload task must
/// not wedge every later batch.
pub(crate) fn lock(store: &Arc<Mutex<SlotStore>>) -> std::sync::MutexGuard<'_, SlotStore> {
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
