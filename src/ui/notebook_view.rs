//! Notebook panel: draws the rendered cells of the displayed notebook

use eframe::egui::{self, Color32, FontId, RichText, Ui};
use eframe::egui::text::{LayoutJob, TextFormat};
use egui_commonmark::{CommonMarkCache, CommonMarkViewer};

use crate::core::config::ViewerConfig;
use crate::core::highlight::{Token, TokenKind};
use crate::core::render::{ExecutionLabel, RenderedCell, RenderedOutput, RenderedView};

/// Action requested from the notebook header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotebookAction {
    BackToLibrary,
    OpenExternally,
    DismissError,
}

/// Everything the panel needs for one frame
pub struct NotebookPanel<'a> {
    pub rendered: &'a RenderedView,
    pub viewer: &'a ViewerConfig,
    pub loading: bool,
    pub error: Option<&'a str>,
    pub has_file: bool,
}

impl NotebookPanel<'_> {
    /// Show the notebook panel
    pub fn show(self, ui: &mut Ui, cache: &mut CommonMarkCache) -> Option<NotebookAction> {
        let mut action = None;

        ui.horizontal(|ui| {
            if ui.button("\u{2190} Back to Library").clicked() {
                action = Some(NotebookAction::BackToLibrary);
            }
            if let RenderedView::Document { name, .. } = self.rendered {
                ui.separator();
                ui.strong(name);
            }
            if self.loading {
                ui.spinner();
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if self.has_file && ui.button("Open externally").clicked() {
                    action = Some(NotebookAction::OpenExternally);
                }
            });
        });

        if let Some(error) = self.error {
            egui::Frame::none()
                .fill(Color32::from_rgb(120, 30, 30))
                .inner_margin(egui::Margin::same(6))
                .rounding(4.0)
                .show(ui, |ui| {
                    ui.horizontal(|ui| {
                        ui.label(RichText::new(error).color(Color32::WHITE));
                        if ui.small_button("\u{2715}").clicked() {
                            action = Some(NotebookAction::DismissError);
                        }
                    });
                });
        }

        ui.separator();

        egui::ScrollArea::vertical()
            .id_salt("notebook_scroll")
            .auto_shrink([false, false])
            .show(ui, |ui| match self.rendered {
                RenderedView::NoDocument => Self::show_empty(ui, self.loading),
                RenderedView::Document { cells, .. } if cells.is_empty() => {
                    ui.weak("This notebook has no cells.");
                }
                RenderedView::Document { cells, .. } => {
                    for (idx, cell) in cells.iter().enumerate() {
                        show_cell(ui, idx, cell, self.viewer, cache);
                    }
                }
            });

        action
    }

    /// Show empty state
    fn show_empty(ui: &mut Ui, loading: bool) {
        ui.vertical_centered(|ui| {
            ui.add_space(50.0);
            if loading {
                ui.spinner();
                ui.label("Loading notebook...");
            } else {
                ui.label("No notebook selected");
                ui.label("Open a notebook from the library or the File menu");
            }
        });
    }
}

fn show_cell(
    ui: &mut Ui,
    idx: usize,
    cell: &RenderedCell,
    viewer: &ViewerConfig,
    cache: &mut CommonMarkCache,
) {
    match cell {
        RenderedCell::Markdown { markdown, .. } => {
            ui.push_id(("markdown_cell", idx), |ui| {
                CommonMarkViewer::new().show(ui, cache, markdown);
            });
        }
        RenderedCell::Code {
            label,
            tokens,
            outputs,
        } => {
            ui.horizontal_top(|ui| {
                if viewer.show_execution_counts {
                    show_prompt(ui, *label, viewer.font_size);
                }
                ui.vertical(|ui| {
                    show_source(ui, tokens, viewer.font_size);
                    for (out_idx, output) in outputs.iter().enumerate() {
                        show_output(ui, (idx, out_idx), output, viewer);
                    }
                });
            });
        }
        RenderedCell::Placeholder { cell_type, source } => {
            egui::Frame::none()
                .stroke(egui::Stroke::new(1.0, Color32::from_rgb(128, 128, 128)))
                .inner_margin(egui::Margin::same(8))
                .rounding(4.0)
                .show(ui, |ui| {
                    let kind = if cell_type.is_empty() { "unknown" } else { cell_type.as_str() };
                    ui.weak(format!("Unsupported cell type: {kind}"));
                    ui.label(RichText::new(source).font(FontId::monospace(viewer.font_size)));
                });
        }
    }
    ui.add_space(8.0);
}

fn show_prompt(ui: &mut Ui, label: ExecutionLabel, font_size: f32) {
    let text = format!("In {label}:");
    ui.add_sized(
        [64.0, font_size + 6.0],
        egui::Label::new(
            RichText::new(text)
                .font(FontId::monospace(font_size - 2.0))
                .color(Color32::from_rgb(128, 128, 160)),
        ),
    );
}

fn token_color(kind: TokenKind, dark: bool) -> Color32 {
    match (kind, dark) {
        (TokenKind::Comment, _) => Color32::from_rgb(120, 130, 120),
        (TokenKind::String, true) => Color32::from_rgb(206, 145, 120),
        (TokenKind::String, false) => Color32::from_rgb(163, 21, 21),
        (TokenKind::Number, true) => Color32::from_rgb(181, 206, 168),
        (TokenKind::Number, false) => Color32::from_rgb(9, 134, 88),
        (TokenKind::Keyword, true) => Color32::from_rgb(86, 156, 214),
        (TokenKind::Keyword, false) => Color32::from_rgb(0, 0, 255),
        (TokenKind::Function, true) => Color32::from_rgb(220, 220, 170),
        (TokenKind::Function, false) => Color32::from_rgb(121, 94, 38),
        (_, true) => Color32::from_rgb(212, 212, 212),
        (_, false) => Color32::from_rgb(30, 30, 30),
    }
}

fn show_source(ui: &mut Ui, tokens: &[Token], font_size: f32) {
    let dark = ui.visuals().dark_mode;
    let bg_color = if dark {
        Color32::from_rgb(40, 40, 40)
    } else {
        Color32::from_rgb(245, 245, 245)
    };

    let mut job = LayoutJob::default();
    for token in tokens {
        job.append(
            &token.text,
            0.0,
            TextFormat {
                font_id: FontId::monospace(font_size),
                color: token_color(token.kind, dark),
                ..Default::default()
            },
        );
    }

    egui::Frame::none()
        .fill(bg_color)
        .stroke(egui::Stroke::new(1.0, Color32::from_rgb(60, 60, 60)))
        .inner_margin(egui::Margin::same(8))
        .rounding(4.0)
        .show(ui, |ui| {
            ui.set_min_width(ui.available_width());
            ui.label(job);
        });
}

fn show_output(ui: &mut Ui, id: (usize, usize), output: &RenderedOutput, viewer: &ViewerConfig) {
    let RenderedOutput::Preformatted { text, is_error, .. } = output else {
        return;
    };

    let mut rich = RichText::new(text.trim_end_matches('\n')).font(FontId::monospace(viewer.font_size));
    if *is_error {
        rich = rich.color(Color32::from_rgb(200, 60, 60));
    }

    ui.add_space(4.0);
    if viewer.wrap_outputs {
        ui.add(egui::Label::new(rich).wrap());
    } else {
        egui::ScrollArea::horizontal()
            .id_salt(("output_scroll", id))
            .show(ui, |ui| {
                ui.add(egui::Label::new(rich).extend());
            });
    }
}
