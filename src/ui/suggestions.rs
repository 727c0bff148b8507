//! Side panel listing generated topic ideas

use eframe::egui;

use crate::core::suggestions::SuggestionWorker;

/// Suggestion side panel
pub struct SuggestionPanel;

impl SuggestionPanel {
    /// Show the panel; returns true when a new request should be made
    pub fn show(ui: &mut egui::Ui, worker: &SuggestionWorker, seeds: &[String]) -> bool {
        let mut requested = false;

        ui.vertical(|ui| {
            ui.heading("Topic Ideas");
            ui.weak(format!("Seeds: {}", seeds.join(", ")));
            ui.add_space(6.0);

            let button = ui.add_enabled(
                worker.is_available() && !worker.is_pending(),
                egui::Button::new("\u{2728} Suggest topics"),
            );
            if !worker.is_available() {
                button.on_disabled_hover_text("Set suggestions.api_key in the config file");
            } else if button.clicked() {
                requested = true;
            }

            ui.separator();

            if worker.is_pending() {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Thinking...");
                });
            } else if worker.suggestions().is_empty() {
                ui.weak("No suggestions yet");
            } else {
                for suggestion in worker.suggestions() {
                    ui.label(format!("\u{2022} {suggestion}"));
                }
            }
        });

        requested
    }
}
