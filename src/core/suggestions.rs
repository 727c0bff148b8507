//! Topic suggestions from a generative text service
//!
//! The service is optional. Any failure (no API key, network error, odd
//! response) is logged and turned into an empty suggestion list.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex_lite::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::runtime::Handle;

use super::config::SuggestionConfig;
use super::loader::CompletionNotifier;

const MAX_SUGGESTIONS: usize = 5;

#[async_trait]
pub trait SuggestionService: Send + Sync {
    /// Ordered suggestions for the given topic seeds
    async fn suggest(&self, seeds: &[String]) -> Result<Vec<String>>;
}

/// Gemini `generateContent` client
pub struct GeminiSuggestionService {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiSuggestionService {
    /// Build a client from config; `None` when no API key is configured
    pub fn from_config(config: &SuggestionConfig) -> Option<Self> {
        let api_key = config.api_key.as_deref()?.trim();
        if api_key.is_empty() {
            return None;
        }
        Some(Self {
            client: Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.to_string(),
        })
    }

    fn prompt(seeds: &[String]) -> String {
        format!(
            "Suggest {MAX_SUGGESTIONS} short, catchy titles for data-analysis notebooks or blog posts \
             that combine these research topics: {}. Return one title per line with no extra text.",
            seeds.join(", ")
        )
    }
}

#[async_trait]
impl SuggestionService for GeminiSuggestionService {
    async fn suggest(&self, seeds: &[String]) -> Result<Vec<String>> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.endpoint, self.model
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": Self::prompt(seeds) }] }]
        });

        let response: GenerateResponse = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Suggestion request failed")?
            .error_for_status()
            .map_err(reqwest::Error::without_url)
            .context("Suggestion service returned an error")?
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Malformed suggestion response")?;

        Ok(suggestions_from_response(response))
    }
}

/// Join the text parts of every candidate and split it into suggestions
fn suggestions_from_response(response: GenerateResponse) -> Vec<String> {
    let text = response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .filter_map(|p| p.text)
        .collect::<Vec<_>>()
        .join("\n");

    parse_suggestions(&text)
}

/// Split generated text into clean, non-empty suggestion lines
pub fn parse_suggestions(text: &str) -> Vec<String> {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    let marker = MARKER.get_or_init(|| {
        Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s*").expect("list marker pattern is valid")
    });

    text.lines()
        .map(|line| {
            marker
                .replace(line, "")
                .trim()
                .trim_matches(|c| c == '*' || c == '"')
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .take(MAX_SUGGESTIONS)
        .collect()
}

/// Ask `service` for suggestions; failures produce an empty list
pub async fn suggest_or_empty(service: &dyn SuggestionService, seeds: &[String]) -> Vec<String> {
    match service.suggest(seeds).await {
        Ok(suggestions) => suggestions,
        Err(err) => {
            tracing::warn!("No suggestions produced: {:#}", err);
            Vec::new()
        }
    }
}

/// Runs suggestion requests in the background; only the newest request's
/// answer is kept
pub struct SuggestionWorker {
    runtime: Handle,
    service: Option<Arc<dyn SuggestionService>>,
    tx: Sender<(u64, Vec<String>)>,
    rx: Receiver<(u64, Vec<String>)>,
    latest: u64,
    pending: bool,
    suggestions: Vec<String>,
    notifier: Option<CompletionNotifier>,
}

impl SuggestionWorker {
    pub fn new(runtime: Handle, service: Option<Arc<dyn SuggestionService>>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            runtime,
            service,
            tx,
            rx,
            latest: 0,
            pending: false,
            suggestions: Vec::new(),
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: CompletionNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn is_available(&self) -> bool {
        self.service.is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn request(&mut self, seeds: Vec<String>) {
        let Some(service) = self.service.clone() else {
            tracing::info!("Suggestion service not configured");
            self.suggestions.clear();
            return;
        };

        self.latest += 1;
        self.pending = true;
        let id = self.latest;
        let tx = self.tx.clone();
        let notifier = self.notifier.clone();

        self.runtime.spawn(async move {
            let suggestions = suggest_or_empty(service.as_ref(), &seeds).await;
            if tx.send((id, suggestions)).is_ok() {
                if let Some(notify) = notifier {
                    notify();
                }
            }
        });
    }

    /// Apply finished requests; returns true when the list changed
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        loop {
            match self.rx.try_recv() {
                Ok((id, suggestions)) if id == self.latest => {
                    self.suggestions = suggestions;
                    self.pending = false;
                    changed = true;
                }
                Ok(_) => {}
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        changed
    }
}
