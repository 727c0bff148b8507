//! Main application state and UI coordination

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use eframe::egui;
use tokio::runtime::Runtime;

use crate::core::config::AppConfig;
use crate::core::library::{Library, LibraryScanner};
use crate::core::loader::{CompletionNotifier, NotebookLoader, NotebookSource};
use crate::core::render::{render_view, RenderedView};
use crate::core::session::{LoadApplied, ViewerSession};
use crate::core::suggestions::{GeminiSuggestionService, SuggestionService, SuggestionWorker};
use crate::ui::library::{LibraryAction, LibraryPanel};
use crate::ui::notebook_view::{NotebookAction, NotebookPanel};
use crate::ui::suggestions::SuggestionPanel;

/// Which top-level page is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Page {
    #[default]
    Library,
    Notebook,
}

/// Main application state
pub struct NotebookViewerApp {
    /// Background runtime for file loads and suggestion requests
    _runtime: Runtime,
    /// Application configuration
    pub config: AppConfig,
    /// Featured and scanned notebooks
    pub library: Library,
    pub tag_filter: Option<String>,
    scanner: LibraryScanner,
    /// Owner of the displayed notebook
    pub session: ViewerSession,
    loader: NotebookLoader,
    /// Render of `session`, refreshed whenever it changes
    rendered: RenderedView,
    suggestions: SuggestionWorker,
    pub page: Page,
    /// Commonmark cache for markdown cells
    pub commonmark_cache: egui_commonmark::CommonMarkCache,
}

impl NotebookViewerApp {
    /// Create a new application instance
    pub fn new(cc: &eframe::CreationContext<'_>, config: AppConfig) -> Result<Self> {
        egui_extras::install_image_loaders(&cc.egui_ctx);
        Self::apply_theme(&cc.egui_ctx, &config);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("nbview-worker")
            .enable_all()
            .build()
            .context("Failed to start background runtime")?;

        let ctx = cc.egui_ctx.clone();
        let repaint: CompletionNotifier = Arc::new(move || ctx.request_repaint());

        let loader = NotebookLoader::new(runtime.handle().clone()).with_notifier(repaint.clone());

        let service = GeminiSuggestionService::from_config(&config.suggestions)
            .map(|s| Arc::new(s) as Arc<dyn SuggestionService>);
        let suggestions = SuggestionWorker::new(runtime.handle().clone(), service)
            .with_notifier(repaint.clone());

        let mut scanner = LibraryScanner::new(runtime.handle().clone()).with_notifier(repaint);
        if let Some(dir) = &config.library_dir {
            scanner.request(dir.clone());
        }

        let session = ViewerSession::new();
        let rendered = render_view(&session.view());

        Ok(Self {
            _runtime: runtime,
            config,
            library: Library::with_featured(),
            tag_filter: None,
            scanner,
            session,
            loader,
            rendered,
            suggestions,
            page: Page::Library,
            commonmark_cache: egui_commonmark::CommonMarkCache::default(),
        })
    }

    fn apply_theme(ctx: &egui::Context, config: &AppConfig) {
        if config.is_dark() {
            ctx.set_visuals(egui::Visuals::dark());
        } else {
            ctx.set_visuals(egui::Visuals::light());
        }
    }

    fn save_config(&self) {
        if let Err(e) = self.config.save() {
            tracing::error!("Failed to save config: {:#}", e);
        }
    }

    fn refresh_render(&mut self) {
        self.rendered = render_view(&self.session.view());
    }

    /// Start loading a notebook; the current one stays visible until it commits
    pub fn open_source(&mut self, source: NotebookSource) {
        let ticket = self.session.begin_load();
        self.loader.request(ticket, source);
        self.page = Page::Notebook;
    }

    /// Let the user pick an `.ipynb` file and load it
    pub fn open_file_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Jupyter Notebook", &["ipynb"])
            .pick_file()
        {
            self.open_source(NotebookSource::File(path));
        }
    }

    /// Scan a folder for notebooks and remember it
    pub fn choose_library_folder(&mut self) {
        if let Some(path) = rfd::FileDialog::new().pick_folder() {
            self.scanner.request(path.clone());
            self.config.library_dir = Some(path);
            self.save_config();
        }
    }

    /// Return to the library with no notebook selected
    pub fn back_to_library(&mut self) {
        self.session.clear();
        self.refresh_render();
        self.page = Page::Library;
    }

    fn export_html(&self) -> Result<Option<PathBuf>> {
        let default_name = match &self.rendered {
            RenderedView::Document { name, .. } => format!("{}.html", name.trim_end_matches(".ipynb")),
            RenderedView::NoDocument => "notebook.html".to_string(),
        };
        let Some(path) = rfd::FileDialog::new()
            .add_filter("HTML", &["html"])
            .set_file_name(default_name)
            .save_file()
        else {
            return Ok(None);
        };

        std::fs::write(&path, self.rendered.to_html_page())
            .with_context(|| format!("Failed to export HTML: {}", path.display()))?;
        tracing::info!("Exported notebook to: {}", path.display());
        Ok(Some(path))
    }

    fn suggestion_seeds(&self) -> Vec<String> {
        let mut seeds = self.config.suggestions.seeds.clone();
        for tag in self.library.tags() {
            if !seeds.iter().any(|s| s.eq_ignore_ascii_case(&tag)) {
                seeds.push(tag);
            }
        }
        seeds
    }

    /// Apply finished background work
    fn poll_background(&mut self) {
        let mut changed = false;
        for outcome in self.loader.poll() {
            let path = outcome.path.clone();
            match self.session.complete_load(outcome) {
                LoadApplied::Committed => {
                    if let Some(path) = path {
                        self.config.add_recent_notebook(path);
                        self.save_config();
                    }
                    changed = true;
                }
                // The session keeps the error for the notebook panel banner
                LoadApplied::Failed(_) | LoadApplied::Stale => {}
            }
        }
        if changed {
            self.refresh_render();
        }
        if let Some((root, scanned)) = self.scanner.poll() {
            self.library.apply_scan(root, scanned);
        }
        self.suggestions.poll();
    }

    /// Render the top menu bar
    fn render_menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open Notebook...").clicked() {
                        self.open_file_dialog();
                        ui.close();
                    }
                    ui.menu_button("Open Recent", |ui| {
                        if self.config.recent_notebooks.is_empty() {
                            ui.weak("No recent notebooks");
                        }
                        for path in self.config.recent_notebooks.clone() {
                            let label = path
                                .file_name()
                                .map(|s| s.to_string_lossy().to_string())
                                .unwrap_or_else(|| path.display().to_string());
                            if ui.button(label).on_hover_text(path.display().to_string()).clicked() {
                                self.open_source(NotebookSource::File(path));
                                ui.close();
                            }
                        }
                    });
                    if ui.button("Choose Library Folder...").clicked() {
                        self.choose_library_folder();
                        ui.close();
                    }
                    let has_document = matches!(self.rendered, RenderedView::Document { .. });
                    if ui
                        .add_enabled(has_document, egui::Button::new("Export HTML..."))
                        .clicked()
                    {
                        if let Err(e) = self.export_html() {
                            tracing::error!("{:#}", e);
                        }
                        ui.close();
                    }
                    if ui.button("Back to Library").clicked() {
                        self.back_to_library();
                        ui.close();
                    }
                    ui.separator();
                    if ui.button("Exit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.menu_button("View", |ui| {
                    if ui.button("Toggle Suggestions").clicked() {
                        self.config.ui.suggestions_visible = !self.config.ui.suggestions_visible;
                        self.save_config();
                        ui.close();
                    }
                    ui.separator();
                    if ui.selectable_label(!self.config.is_dark(), "Light").clicked() {
                        self.config.ui.theme = "light".to_string();
                        Self::apply_theme(ctx, &self.config);
                        self.save_config();
                        ui.close();
                    }
                    if ui.selectable_label(self.config.is_dark(), "Dark").clicked() {
                        self.config.ui.theme = "dark".to_string();
                        Self::apply_theme(ctx, &self.config);
                        self.save_config();
                        ui.close();
                    }
                    ui.separator();
                    let wrap = ui
                        .checkbox(&mut self.config.viewer.wrap_outputs, "Wrap outputs")
                        .changed();
                    let counts = ui
                        .checkbox(
                            &mut self.config.viewer.show_execution_counts,
                            "Show execution counts",
                        )
                        .changed();
                    if wrap || counts {
                        self.save_config();
                    }
                });
            });
        });
    }

    fn handle_library_action(&mut self, action: LibraryAction) {
        match action {
            LibraryAction::Open(meta) => self.open_source(meta.source()),
            LibraryAction::Upload => self.open_file_dialog(),
            LibraryAction::ChooseFolder => self.choose_library_folder(),
            LibraryAction::Refresh => {
                if let Some(root) = self.library.root.clone() {
                    self.scanner.request(root);
                }
            }
            LibraryAction::FilterTag(tag) => self.tag_filter = tag,
        }
    }

    fn handle_notebook_action(&mut self, action: NotebookAction) {
        match action {
            NotebookAction::BackToLibrary => self.back_to_library(),
            NotebookAction::DismissError => self.session.dismiss_error(),
            NotebookAction::OpenExternally => {
                if let Some(path) = self.session.displayed().and_then(|d| d.path.clone()) {
                    if let Err(e) = open::that(&path) {
                        tracing::error!("Failed to open {}: {}", path.display(), e);
                    }
                }
            }
        }
    }
}

impl eframe::App for NotebookViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_background();

        // Handle keyboard shortcuts
        let (open, back) = ctx.input(|i| {
            (
                i.modifiers.ctrl && i.key_pressed(egui::Key::O),
                i.key_pressed(egui::Key::Escape),
            )
        });
        if open {
            self.open_file_dialog();
        }
        if back && self.page == Page::Notebook {
            self.back_to_library();
        }

        // Dropped files replace the current notebook; only the last one counts
        let dropped = ctx.input(|i| i.raw.dropped_files.last().cloned());
        if let Some(file) = dropped {
            if let Some(path) = file.path {
                self.open_source(NotebookSource::File(path));
            } else if let Some(bytes) = file.bytes {
                self.open_source(NotebookSource::Bytes {
                    name: file.name,
                    bytes: bytes.to_vec(),
                });
            }
        }

        // Render menu bar
        self.render_menu_bar(ctx);

        if self.config.ui.suggestions_visible {
            let seeds = self.suggestion_seeds();
            egui::SidePanel::right("suggestions")
                .resizable(true)
                .default_width(260.0)
                .min_width(180.0)
                .show(ctx, |ui| {
                    if SuggestionPanel::show(ui, &self.suggestions, &seeds) {
                        self.suggestions.request(seeds.clone());
                    }
                });
        }

        // Render main content area
        egui::CentralPanel::default().show(ctx, |ui| match self.page {
            Page::Library => {
                if let Some(action) =
                    LibraryPanel::show(
                        ui,
                        &self.library,
                        self.tag_filter.as_deref(),
                        self.scanner.is_scanning(),
                    )
                {
                    self.handle_library_action(action);
                }
            }
            Page::Notebook => {
                let panel = NotebookPanel {
                    rendered: &self.rendered,
                    viewer: &self.config.viewer,
                    loading: self.session.is_loading(),
                    error: self.session.last_error(),
                    has_file: self
                        .session
                        .displayed()
                        .is_some_and(|d| d.path.is_some()),
                };
                if let Some(action) = panel.show(ui, &mut self.commonmark_cache) {
                    self.handle_notebook_action(action);
                }
            }
        });
    }
}
