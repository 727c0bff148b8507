//! Library panel: notebook cards, tag filter, upload entry

use eframe::egui::{self, Color32, RichText, Ui};

use crate::core::library::{Library, NotebookMeta};

const CARD_WIDTH: f32 = 280.0;

/// Action requested from the library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryAction {
    Open(NotebookMeta),
    Upload,
    ChooseFolder,
    Refresh,
    FilterTag(Option<String>),
}

/// Library panel
pub struct LibraryPanel;

impl LibraryPanel {
    /// Show the library panel
    pub fn show(
        ui: &mut Ui,
        library: &Library,
        tag_filter: Option<&str>,
        scanning: bool,
    ) -> Option<LibraryAction> {
        let mut action = None;

        ui.horizontal(|ui| {
            ui.vertical(|ui| {
                ui.heading("Notebook Library");
                ui.weak("Explore analysis workflows and data tutorials.");
            });
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if scanning {
                    ui.spinner();
                } else if library.root.is_some()
                    && ui.button("\u{21BB}").on_hover_text("Rescan folder").clicked()
                {
                    action = Some(LibraryAction::Refresh);
                }
                if ui.button("Choose Folder...").clicked() {
                    action = Some(LibraryAction::ChooseFolder);
                }
                egui::ComboBox::from_id_salt("tag_filter")
                    .selected_text(tag_filter.unwrap_or("All tags"))
                    .show_ui(ui, |ui| {
                        if ui.selectable_label(tag_filter.is_none(), "All tags").clicked() {
                            action = Some(LibraryAction::FilterTag(None));
                        }
                        for tag in library.tags() {
                            let selected = tag_filter == Some(tag.as_str());
                            if ui.selectable_label(selected, &tag).clicked() {
                                action = Some(LibraryAction::FilterTag(Some(tag.clone())));
                            }
                        }
                    });
            });
        });

        ui.separator();

        egui::ScrollArea::vertical()
            .id_salt("library_scroll")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                ui.horizontal_wrapped(|ui| {
                    if Self::show_upload_card(ui) {
                        action = Some(LibraryAction::Upload);
                    }
                    for meta in library.filter_by_tag(tag_filter) {
                        if Self::show_card(ui, meta) {
                            action = Some(LibraryAction::Open(meta.clone()));
                        }
                    }
                });
            });

        action
    }

    fn card_frame(ui: &Ui) -> egui::Frame {
        egui::Frame::group(ui.style())
            .inner_margin(egui::Margin::same(10))
            .rounding(8.0)
    }

    /// Returns true when clicked
    fn show_upload_card(ui: &mut Ui) -> bool {
        let response = Self::card_frame(ui)
            .stroke(egui::Stroke::new(1.5, Color32::from_rgb(150, 150, 150)))
            .show(ui, |ui| {
                ui.set_width(CARD_WIDTH);
                ui.set_min_height(240.0);
                ui.vertical_centered(|ui| {
                    ui.add_space(60.0);
                    ui.label(RichText::new("\u{2795}").size(36.0));
                    ui.strong("Upload Notebook");
                    ui.weak("Analyze local .ipynb files");
                });
            })
            .response
            .interact(egui::Sense::click());
        response.on_hover_cursor(egui::CursorIcon::PointingHand).clicked()
    }

    /// Returns true when "Open Notebook" is clicked
    fn show_card(ui: &mut Ui, meta: &NotebookMeta) -> bool {
        let mut open = false;
        Self::card_frame(ui).show(ui, |ui| {
            ui.set_width(CARD_WIDTH);
            ui.vertical(|ui| {
                if let Some(url) = &meta.image_url {
                    ui.add(
                        egui::Image::new(url.as_str())
                            .fit_to_exact_size(egui::vec2(CARD_WIDTH, 120.0)),
                    );
                }
                if !meta.date.is_empty() {
                    ui.weak(&meta.date);
                }
                ui.label(RichText::new(&meta.title).strong().size(16.0));
                ui.add(egui::Label::new(&meta.description).wrap());
                ui.horizontal_wrapped(|ui| {
                    for tag in &meta.tags {
                        ui.label(RichText::new(tag).small().background_color(ui.visuals().faint_bg_color));
                    }
                });
                ui.add_space(4.0);
                if ui
                    .add_sized([CARD_WIDTH, 28.0], egui::Button::new("Open Notebook"))
                    .clicked()
                {
                    open = true;
                }
            });
        });
        open
    }
}
