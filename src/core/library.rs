//! Notebook library: summaries shown before a notebook is opened

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use walkdir::WalkDir;

use super::loader::{load_source, CompletionNotifier, NotebookSource};
use super::notebook::{Cell, NotebookDocument};

/// Summary of a notebook in the library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookMeta {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub date: String,
    pub image_url: Option<String>,
    /// Backing file, if the notebook exists on disk
    pub path: Option<PathBuf>,
}

impl NotebookMeta {
    /// Source to load when this entry is opened
    pub fn source(&self) -> NotebookSource {
        match &self.path {
            Some(path) => NotebookSource::File(path.clone()),
            None => NotebookSource::Placeholder {
                title: self.title.clone(),
            },
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Summarize a parsed notebook stored at `path`
    pub fn from_document(path: &Path, document: &NotebookDocument) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Untitled".to_string());

        let title = document
            .metadata_value("title")
            .map(str::to_string)
            .or_else(|| document.first_heading())
            .unwrap_or_else(|| stem.clone());

        let tags = ["tags", "keywords"]
            .iter()
            .filter_map(|key| document.metadata.get(*key))
            .flatten()
            .cloned()
            .collect();

        let date = std::fs::metadata(path)
            .ok()
            .and_then(|m| m.modified().ok())
            .map(format_date)
            .unwrap_or_default();

        Self {
            id: path.display().to_string(),
            title,
            description: first_paragraph(document).unwrap_or_default(),
            tags,
            date,
            image_url: None,
            path: Some(path.to_path_buf()),
        }
    }
}

/// `YYYY-MM-DD` for a timestamp (UTC)
fn format_date(time: std::time::SystemTime) -> String {
    DateTime::<Utc>::from(time).format("%Y-%m-%d").to_string()
}

/// First non-heading markdown paragraph, trimmed to one line
fn first_paragraph(document: &NotebookDocument) -> Option<String> {
    document
        .cells
        .iter()
        .filter(|cell| matches!(cell, Cell::Markdown { .. }))
        .flat_map(|cell| {
            cell.joined_source()
                .split("\n\n")
                .map(|p| p.trim().to_string())
                .collect::<Vec<_>>()
        })
        .find(|p| !p.is_empty() && !p.starts_with('#'))
        .map(|p| p.lines().collect::<Vec<_>>().join(" "))
}

/// The built-in featured notebooks
pub fn featured() -> Vec<NotebookMeta> {
    let entry = |id: &str, title: &str, description: &str, tags: &[&str], date: &str, image: u32| {
        NotebookMeta {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            date: date.to_string(),
            image_url: Some(format!("https://picsum.photos/400/200?random={image}")),
            path: None,
        }
    };

    vec![
        entry(
            "nb1",
            "Chlorophyll-a Estimation with ML",
            "A comprehensive notebook demonstrating how to preprocess Sentinel-3 data and train an XGBoost model to estimate Chlorophyll-a concentrations.",
            &["Machine Learning", "Remote Sensing", "Python"],
            "2024-02-15",
            10,
        ),
        entry(
            "nb2",
            "Gulf of Mexico Hypoxia Analysis",
            "Analyzing spatial and temporal trends of hypoxic zones using long-term dissolved oxygen data and hydrodynamic model outputs.",
            &["Oceanography", "Data Analysis", "Visualization"],
            "2023-11-20",
            11,
        ),
        entry(
            "nb3",
            "Introduction to GEE in Python",
            "Tutorial for getting started with Google Earth Engine API in Python for large-scale environmental monitoring.",
            &["GEE", "Tutorial", "Cloud Computing"],
            "2023-09-05",
            12,
        ),
        entry(
            "nb4",
            "Time Series Forecasting with ARIMA",
            "Forecasting sea surface temperature anomalies using ARIMA and Prophet models.",
            &["Statistics", "Time Series", "R"],
            "2023-08-10",
            13,
        ),
    ]
}

/// Find and summarize every `.ipynb` below `root`
pub fn scan_directory(root: &Path) -> Vec<NotebookMeta> {
    let mut metas: Vec<NotebookMeta> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            e.depth() == 0 || !(name.starts_with('.') || name == ".ipynb_checkpoints")
        })
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .map(|ext| ext == "ipynb")
                    .unwrap_or(false)
        })
        .filter_map(|e| {
            let path = e.path();
            match load_source(&NotebookSource::File(path.to_path_buf())) {
                Ok(document) => Some(NotebookMeta::from_document(path, &document)),
                Err(err) => {
                    tracing::warn!("Skipping {}: {}", path.display(), err);
                    None
                }
            }
        })
        .collect();

    metas.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
    tracing::info!("Found {} notebooks in {}", metas.len(), root.display());
    metas
}

/// Featured notebooks plus whatever was found on disk
#[derive(Debug, Clone, Default)]
pub struct Library {
    pub entries: Vec<NotebookMeta>,
    pub root: Option<PathBuf>,
}

impl Library {
    pub fn with_featured() -> Self {
        Self {
            entries: featured(),
            root: None,
        }
    }

    /// Replace scanned entries with a finished scan of `root`
    pub fn apply_scan(&mut self, root: PathBuf, scanned: Vec<NotebookMeta>) {
        self.entries.retain(|e| e.path.is_none());
        self.entries.extend(scanned);
        self.root = Some(root);
    }

    /// All tags, sorted and de-duplicated
    pub fn tags(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|e| e.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Entries carrying `tag`; every entry when `tag` is `None`
    pub fn filter_by_tag(&self, tag: Option<&str>) -> Vec<&NotebookMeta> {
        self.entries
            .iter()
            .filter(|e| tag.map_or(true, |t| e.has_tag(t)))
            .collect()
    }
}

/// Scans library folders on the background runtime; only the newest
/// request's result is delivered
pub struct LibraryScanner {
    runtime: Handle,
    tx: Sender<(u64, PathBuf, Vec<NotebookMeta>)>,
    rx: Receiver<(u64, PathBuf, Vec<NotebookMeta>)>,
    latest: u64,
    scanning: bool,
    notifier: Option<CompletionNotifier>,
}

impl LibraryScanner {
    pub fn new(runtime: Handle) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            runtime,
            tx,
            rx,
            latest: 0,
            scanning: false,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: CompletionNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// Start scanning `root`; supersedes any scan still running
    pub fn request(&mut self, root: PathBuf) {
        self.latest += 1;
        self.scanning = true;
        let id = self.latest;
        let tx = self.tx.clone();
        let notifier = self.notifier.clone();
        tracing::info!("Scanning library folder: {}", root.display());

        self.runtime.spawn_blocking(move || {
            let metas = scan_directory(&root);
            if tx.send((id, root, metas)).is_ok() {
                if let Some(notify) = notifier {
                    notify();
                }
            }
        });
    }

    /// Newest finished scan, if it arrived since the last poll
    pub fn poll(&mut self) -> Option<(PathBuf, Vec<NotebookMeta>)> {
        let mut finished = None;
        loop {
            match self.rx.try_recv() {
                Ok((id, root, metas)) if id == self.latest => {
                    self.scanning = false;
                    finished = Some((root, metas));
                }
                Ok(_) => {}
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_featured_entries_open_placeholders() {
        let featured = featured();
        assert_eq!(featured.len(), 4);
        assert_eq!(
            featured[0].source(),
            NotebookSource::Placeholder {
                title: "Chlorophyll-a Estimation with ML".to_string()
            }
        );
    }

    #[test]
    fn test_tags_and_filter() {
        let library = Library::with_featured();
        let tags = library.tags();
        assert!(tags.contains(&"Python".to_string()));
        assert!(tags.windows(2).all(|w| w[0] <= w[1]));

        let python = library.filter_by_tag(Some("python"));
        assert_eq!(python.len(), 1);
        assert_eq!(python[0].id, "nb1");
        assert_eq!(library.filter_by_tag(None).len(), 4);
    }

    #[test]
    fn test_scan_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("sst.ipynb"),
            r##"{"cells": [{"cell_type": "markdown", "source": ["# SST Trends\n", "\n", "Weekly anomalies\n", "by basin."]}],
                "metadata": {"tags": ["ocean"]}}"##,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.ipynb"), "{not json").unwrap();
        std::fs::write(dir.path().join("notes.md"), "# not a notebook").unwrap();
        std::fs::create_dir(dir.path().join(".ipynb_checkpoints")).unwrap();
        std::fs::write(
            dir.path().join(".ipynb_checkpoints").join("sst-checkpoint.ipynb"),
            r#"{"cells": []}"#,
        )
        .unwrap();

        let metas = scan_directory(dir.path());
        assert_eq!(metas.len(), 1);
        let meta = &metas[0];
        assert_eq!(meta.title, "SST Trends");
        assert_eq!(meta.description, "Weekly anomalies by basin.");
        assert_eq!(meta.tags, vec!["ocean".to_string()]);
        assert_eq!(meta.date.len(), 10);
        assert!(matches!(meta.source(), NotebookSource::File(_)));
    }

    #[test]
    fn test_title_falls_back_to_file_stem() {
        let doc = NotebookDocument::from_json(r#"{"cells": [{"cell_type": "code", "source": "1"}]}"#).unwrap();
        let meta = NotebookMeta::from_document(Path::new("/tmp/untitled-analysis.ipynb"), &doc);
        assert_eq!(meta.title, "untitled-analysis");
        assert!(meta.description.is_empty());
    }

    #[test]
    fn test_load_directory_keeps_featured() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ipynb"), r#"{"cells": []}"#).unwrap();

        let mut library = Library::with_featured();
        library.apply_scan(dir.path().to_path_buf(), scan_directory(dir.path()));
        library.apply_scan(dir.path().to_path_buf(), scan_directory(dir.path()));
        assert_eq!(library.entries.len(), 5);
        assert_eq!(library.root.as_deref(), Some(dir.path()));
    }

    fn wait_for_scan(scanner: &mut LibraryScanner) -> Option<(PathBuf, Vec<NotebookMeta>)> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(result) = scanner.poll() {
                return Some(result);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn test_scanner_runs_in_background() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.ipynb"),
            r##"{"cells": [{"cell_type": "markdown", "source": "# Salinity"}]}"##,
        )
        .unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut scanner = LibraryScanner::new(runtime.handle().clone());

        scanner.request(dir.path().to_path_buf());
        assert!(scanner.is_scanning());

        let (root, metas) = wait_for_scan(&mut scanner).unwrap();
        assert!(!scanner.is_scanning());
        assert_eq!(root, dir.path());
        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0].title, "Salinity");
    }

    #[test]
    fn test_scanner_keeps_newest_folder() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(first.path().join("a.ipynb"), r#"{"cells": []}"#).unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut scanner = LibraryScanner::new(runtime.handle().clone());

        scanner.request(first.path().to_path_buf());
        scanner.request(second.path().to_path_buf());

        let (root, metas) = wait_for_scan(&mut scanner).unwrap();
        assert_eq!(root, second.path());
        assert!(metas.is_empty());

        // The superseded scan never surfaces
        std::thread::sleep(Duration::from_millis(50));
        assert!(scanner.poll().is_none());
    }

    #[test]
    fn test_date_formatting() {
        let t = std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_708_000_000);
        assert_eq!(format_date(t), "2024-02-15");
    }
}
