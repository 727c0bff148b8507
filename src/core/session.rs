//! Viewer session: the single owner of the displayed notebook
//!
//! Loads are identified by tickets. Only the most recently issued ticket may
//! commit; `replace` and `clear` also retire every outstanding ticket, so a
//! slow load can never overwrite something the user chose afterwards.

use std::path::PathBuf;

use super::error::NotebookError;
use super::notebook::NotebookDocument;

/// Identifies one load request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTicket(u64);

/// Completion of a load request, produced by the loader
#[derive(Debug)]
pub struct LoadOutcome {
    pub ticket: LoadTicket,
    /// Display name of the source (file name or notebook title)
    pub name: String,
    pub path: Option<PathBuf>,
    pub result: Result<NotebookDocument, NotebookError>,
}

/// What `complete_load` did with an outcome
#[derive(Debug)]
pub enum LoadApplied {
    Committed,
    /// Superseded by a newer request; discarded
    Stale,
    Failed(NotebookError),
}

/// The notebook currently on screen
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayedNotebook {
    pub name: String,
    pub path: Option<PathBuf>,
    pub document: NotebookDocument,
}

/// What the viewer shows
#[derive(Debug, Clone, Copy)]
pub enum ViewState<'a> {
    NoDocument,
    Document(&'a DisplayedNotebook),
}

#[derive(Debug, Default)]
pub struct ViewerSession {
    displayed: Option<DisplayedNotebook>,
    /// Last ticket handed out
    issued: u64,
    /// Ticket that may still commit
    pending: Option<LoadTicket>,
    last_error: Option<String>,
}

impl ViewerSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a new document, discarding any in-flight load
    pub fn replace(&mut self, name: impl Into<String>, document: NotebookDocument) {
        self.commit(DisplayedNotebook {
            name: name.into(),
            path: None,
            document,
        });
    }

    /// Return to the "no document selected" state, discarding any in-flight load
    pub fn clear(&mut self) {
        self.pending = None;
        self.last_error = None;
        if let Some(previous) = self.displayed.take() {
            tracing::debug!("Cleared notebook: {}", previous.name);
        }
    }

    /// Issue a ticket for a new load; any older ticket becomes stale
    pub fn begin_load(&mut self) -> LoadTicket {
        self.issued += 1;
        let ticket = LoadTicket(self.issued);
        self.pending = Some(ticket);
        ticket
    }

    /// Apply a finished load. The displayed document only changes on success
    /// of the newest request.
    pub fn complete_load(&mut self, outcome: LoadOutcome) -> LoadApplied {
        if self.pending != Some(outcome.ticket) {
            tracing::debug!(
                "Discarding stale load of '{}' (ticket {:?})",
                outcome.name,
                outcome.ticket
            );
            return LoadApplied::Stale;
        }

        self.pending = None;
        match outcome.result {
            Ok(document) => {
                tracing::info!(
                    "Displaying notebook '{}' ({} cells)",
                    outcome.name,
                    document.cells.len()
                );
                self.commit(DisplayedNotebook {
                    name: outcome.name,
                    path: outcome.path,
                    document,
                });
                LoadApplied::Committed
            }
            Err(err) => {
                tracing::error!("Failed to load notebook '{}': {}", outcome.name, err);
                self.last_error = Some(err.to_string());
                LoadApplied::Failed(err)
            }
        }
    }

    fn commit(&mut self, displayed: DisplayedNotebook) {
        self.pending = None;
        self.last_error = None;
        self.displayed = Some(displayed);
    }

    pub fn view(&self) -> ViewState<'_> {
        match &self.displayed {
            Some(displayed) => ViewState::Document(displayed),
            None => ViewState::NoDocument,
        }
    }

    pub fn displayed(&self) -> Option<&DisplayedNotebook> {
        self.displayed.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Message of the last failed load, until the next successful change
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }
}
