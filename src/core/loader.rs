//! Notebook loading: turning a source into a `NotebookDocument`
//!
//! Placeholder and file sources go through the same contract, so callers
//! never need to special-case the demo path.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;

use tokio::runtime::Handle;

use super::error::{NotebookError, Result};
use super::notebook::NotebookDocument;
use super::session::{LoadOutcome, LoadTicket};

/// Where a notebook comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotebookSource {
    /// Generated demonstration document
    Placeholder { title: String },
    /// `.ipynb` file on disk
    File(PathBuf),
    /// Raw serialized notebook already in memory
    Bytes { name: String, bytes: Vec<u8> },
}

impl NotebookSource {
    /// Human-readable name shown while loading and after
    pub fn display_name(&self) -> String {
        match self {
            NotebookSource::Placeholder { title } => title.clone(),
            NotebookSource::File(path) => file_label(path),
            NotebookSource::Bytes { name, .. } => name.clone(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            NotebookSource::File(path) => Some(path),
            _ => None,
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_error(path: &Path, source: std::io::Error) -> NotebookError {
    NotebookError::LoadIo {
        name: path.display().to_string(),
        source,
    }
}

/// Load a notebook, blocking the calling thread for file reads
pub fn load_source(source: &NotebookSource) -> Result<NotebookDocument> {
    match source {
        NotebookSource::Placeholder { title } => Ok(NotebookDocument::placeholder(title)),
        NotebookSource::File(path) => {
            let bytes = std::fs::read(path).map_err(|e| read_error(path, e))?;
            NotebookDocument::from_bytes(&bytes)
        }
        NotebookSource::Bytes { bytes, .. } => NotebookDocument::from_bytes(bytes),
    }
}

/// Load a notebook on the async runtime
pub async fn load_source_async(source: &NotebookSource) -> Result<NotebookDocument> {
    match source {
        NotebookSource::File(path) => {
            let bytes = tokio::fs::read(path).await.map_err(|e| read_error(path, e))?;
            NotebookDocument::from_bytes(&bytes)
        }
        other => load_source(other),
    }
}

/// Called after every completed load, e.g. to wake the UI
pub type CompletionNotifier = Arc<dyn Fn() + Send + Sync>;

/// Runs loads in the background and hands their outcomes back to the UI thread
pub struct NotebookLoader {
    runtime: Handle,
    outcome_tx: Sender<LoadOutcome>,
    outcome_rx: Receiver<LoadOutcome>,
    notifier: Option<CompletionNotifier>,
}

impl NotebookLoader {
    pub fn new(runtime: Handle) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::channel();
        Self {
            runtime,
            outcome_tx,
            outcome_rx,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: CompletionNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Start loading `source`; the outcome carries `ticket`
    pub fn request(&self, ticket: LoadTicket, source: NotebookSource) {
        let tx = self.outcome_tx.clone();
        let notifier = self.notifier.clone();
        tracing::info!("Loading notebook: {}", source.display_name());

        self.runtime.spawn(async move {
            let result = load_source_async(&source).await;
            let outcome = LoadOutcome {
                ticket,
                name: source.display_name(),
                path: source.path().map(Path::to_path_buf),
                result,
            };
            if tx.send(outcome).is_err() {
                tracing::debug!("Loader receiver dropped; discarding outcome");
                return;
            }
            if let Some(notify) = notifier {
                notify();
            }
        });
    }

    /// Drain all finished loads (non-blocking)
    pub fn poll(&self) -> Vec<LoadOutcome> {
        let mut outcomes = Vec::new();
        loop {
            match self.outcome_rx.try_recv() {
                Ok(outcome) => outcomes.push(outcome),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::{LoadApplied, ViewerSession};
    use std::io::Write;
    use std::time::{Duration, Instant};

    fn wait_for(loader: &NotebookLoader, count: usize) -> Vec<LoadOutcome> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut outcomes = Vec::new();
        while outcomes.len() < count && Instant::now() < deadline {
            outcomes.extend(loader.poll());
            std::thread::sleep(Duration::from_millis(5));
        }
        outcomes
    }

    fn write_notebook(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_placeholder_and_file_share_contract() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_notebook(
            &dir,
            "demo.ipynb",
            r##"{"cells": [{"cell_type": "markdown", "source": ["# Demo"]}], "nbformat": 4, "nbformat_minor": 2}"##,
        );

        let from_file = load_source(&NotebookSource::File(path)).unwrap();
        let from_placeholder = load_source(&NotebookSource::Placeholder {
            title: "Demo".to_string(),
        })
        .unwrap();

        assert_eq!(from_file.first_heading().as_deref(), Some("Demo"));
        assert_eq!(from_placeholder.first_heading().as_deref(), Some("Demo"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_source(&NotebookSource::File(dir.path().join("nope.ipynb"))).unwrap_err();
        assert!(matches!(err, NotebookError::LoadIo { .. }));
    }

    #[test]
    fn test_bytes_without_cells_is_parse_error() {
        let err = load_source(&NotebookSource::Bytes {
            name: "upload.ipynb".to_string(),
            bytes: br#"{"nbformat": 4}"#.to_vec(),
        })
        .unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_background_load_reports_outcome() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let notified = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = notified.clone();
        let loader = NotebookLoader::new(runtime.handle().clone()).with_notifier(Arc::new(move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }));

        let dir = tempfile::tempdir().unwrap();
        let path = write_notebook(&dir, "a.ipynb", r#"{"cells": []}"#);

        let mut session = ViewerSession::new();
        let ticket = session.begin_load();
        loader.request(ticket, NotebookSource::File(path.clone()));

        let mut outcomes = wait_for(&loader, 1);
        assert_eq!(outcomes.len(), 1);
        let outcome = outcomes.remove(0);
        assert_eq!(outcome.name, "a.ipynb");
        assert_eq!(outcome.path.as_deref(), Some(path.as_path()));
        assert!(matches!(session.complete_load(outcome), LoadApplied::Committed));

        let deadline = Instant::now() + Duration::from_secs(5);
        while notified.load(std::sync::atomic::Ordering::SeqCst) == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(notified.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_superseded_background_load_is_discarded() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let loader = NotebookLoader::new(runtime.handle().clone());
        let mut session = ViewerSession::new();

        let first = session.begin_load();
        let second = session.begin_load();
        loader.request(
            first,
            NotebookSource::Placeholder {
                title: "first".to_string(),
            },
        );
        loader.request(
            second,
            NotebookSource::Placeholder {
                title: "second".to_string(),
            },
        );

        // Completion order is not guaranteed; the newest ticket must win either way.
        for outcome in wait_for(&loader, 2) {
            session.complete_load(outcome);
        }
        assert_eq!(session.displayed().map(|d| d.name.as_str()), Some("second"));
    }
}
