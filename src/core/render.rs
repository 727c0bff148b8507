//! Cell rendering
//!
//! Turns notebook cells into a display model that the egui view and the HTML
//! exporter both consume. Rendering is pure: it only borrows the document.
//!
//! Raw HTML embedded in markdown is never passed through. Before formatting,
//! every HTML span found by the markdown parser has its `<` rewritten to
//! `&lt;`, so the tag survives only as visible text.

use std::ops::Range;

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

use super::highlight::{self, Token};
use super::notebook::{Cell, MimeBundle, Output, OutputType};
use super::session::ViewState;

/// MIME keys an output may be rendered from, most preferred first
pub const OUTPUT_PREFERENCE: [&str; 4] = [
    "text/plain",
    "text/markdown",
    "text/latex",
    "application/json",
];

/// Execution label shown in the prompt column of a code cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionLabel {
    Executed(u64),
    Pending,
}

impl std::fmt::Display for ExecutionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionLabel::Executed(n) => write!(f, "[{n}]"),
            ExecutionLabel::Pending => write!(f, "[ ]"),
        }
    }
}

/// Display form of a single output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedOutput {
    Preformatted {
        mime: String,
        text: String,
        is_error: bool,
    },
    /// No representation this viewer can show
    Empty,
}

/// Display form of a single cell
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedCell {
    Markdown {
        /// Markdown with embedded HTML neutralized
        markdown: String,
        html: String,
    },
    Code {
        label: ExecutionLabel,
        tokens: Vec<Token>,
        outputs: Vec<RenderedOutput>,
    },
    Placeholder {
        cell_type: String,
        source: String,
    },
}

/// Display form of the whole viewer
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedView {
    NoDocument,
    Document { name: String, cells: Vec<RenderedCell> },
}

/// Render one cell
pub fn render_cell(cell: &Cell) -> RenderedCell {
    match cell {
        Cell::Markdown { .. } => {
            let markdown = neutralize_html(&cell.joined_source());
            let html = markdown_to_html(&markdown);
            RenderedCell::Markdown { markdown, html }
        }
        Cell::Code {
            execution_count,
            outputs,
            ..
        } => RenderedCell::Code {
            label: execution_count
                .map(ExecutionLabel::Executed)
                .unwrap_or(ExecutionLabel::Pending),
            tokens: highlight::tokenize(&cell.joined_source()),
            outputs: outputs.iter().map(render_output).collect(),
        },
        Cell::Unknown { cell_type, .. } => RenderedCell::Placeholder {
            cell_type: cell_type.clone(),
            source: cell.joined_source(),
        },
    }
}

/// Render one output using the first recognized MIME key
pub fn render_output(output: &Output) -> RenderedOutput {
    match pick_representation(&output.data) {
        Some((mime, fragments)) => RenderedOutput::Preformatted {
            mime: mime.to_string(),
            text: fragments.concat(),
            is_error: output.output_type == OutputType::Error
                || matches!(&output.output_type, OutputType::Stream { name } if name == "stderr"),
        },
        None => {
            tracing::debug!(
                keys = ?output.data.keys().collect::<Vec<_>>(),
                "No renderable representation for output"
            );
            RenderedOutput::Empty
        }
    }
}

fn pick_representation(data: &MimeBundle) -> Option<(&'static str, &[String])> {
    OUTPUT_PREFERENCE
        .iter()
        .find_map(|mime| data.get(*mime).map(|fragments| (*mime, fragments.as_slice())))
}

/// Render whatever the viewer currently shows
pub fn render_view(state: &ViewState<'_>) -> RenderedView {
    match state {
        ViewState::NoDocument => RenderedView::NoDocument,
        ViewState::Document(displayed) => RenderedView::Document {
            name: displayed.name.clone(),
            cells: displayed.document.cells.iter().map(render_cell).collect(),
        },
    }
}

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// Rewrite every raw HTML span so it reads as literal text
pub fn neutralize_html(markdown: &str) -> String {
    let mut spans: Vec<Range<usize>> = Parser::new_ext(markdown, markdown_options())
        .into_offset_iter()
        .filter(|(event, _)| matches!(event, Event::Html(_) | Event::InlineHtml(_)))
        .map(|(_, range)| range)
        .collect();

    if spans.is_empty() {
        return markdown.to_string();
    }

    spans.sort_by_key(|r| r.start);
    let mut out = String::with_capacity(markdown.len() + spans.len() * 3);
    let mut pos = 0;
    for span in spans {
        if span.start < pos {
            continue;
        }
        out.push_str(&markdown[pos..span.start]);
        out.push_str(&markdown[span.clone()].replace('<', "&lt;"));
        pos = span.end;
    }
    out.push_str(&markdown[pos..]);
    out
}

fn is_unsafe_url(url: &str) -> bool {
    let lowered: String = url
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    ["javascript:", "vbscript:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
}

/// Format markdown to an HTML fragment; HTML and script-bearing URLs are neutralized
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, markdown_options()).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) if is_unsafe_url(&dest_url) => Event::Start(Tag::Link {
            link_type,
            dest_url: CowStr::Borrowed("#"),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) if is_unsafe_url(&dest_url) => Event::Start(Tag::Image {
            link_type,
            dest_url: CowStr::Borrowed("#"),
            title,
            id,
        }),
        other => other,
    });

    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl RenderedOutput {
    pub fn to_html(&self) -> String {
        match self {
            RenderedOutput::Preformatted {
                mime,
                text,
                is_error,
            } => format!(
                "<pre class=\"output{}\" data-mime=\"{}\">{}</pre>",
                if *is_error { " error" } else { "" },
                escape_html(mime),
                escape_html(text)
            ),
            RenderedOutput::Empty => String::new(),
        }
    }
}

impl RenderedCell {
    pub fn to_html(&self) -> String {
        match self {
            RenderedCell::Markdown { html, .. } => {
                format!("<div class=\"cell markdown\">{html}</div>")
            }
            RenderedCell::Code {
                label,
                tokens,
                outputs,
            } => {
                let source: String = tokens
                    .iter()
                    .map(|t| {
                        format!(
                            "<span class=\"{}\">{}</span>",
                            t.kind.css_class(),
                            escape_html(&t.text)
                        )
                    })
                    .collect();
                let outputs: String = outputs.iter().map(RenderedOutput::to_html).collect();
                format!(
                    "<div class=\"cell code\"><div class=\"prompt\">{label}</div><pre class=\"source\"><code>{source}</code></pre><div class=\"outputs\">{outputs}</div></div>"
                )
            }
            RenderedCell::Placeholder { cell_type, source } => format!(
                "<div class=\"cell unknown\"><div class=\"cell-type\">Unsupported cell type: {}</div><pre>{}</pre></div>",
                escape_html(cell_type),
                escape_html(source)
            ),
        }
    }

    /// Number of output blocks that produce visible content
    pub fn visible_outputs(&self) -> usize {
        match self {
            RenderedCell::Code { outputs, .. } => outputs
                .iter()
                .filter(|o| !matches!(o, RenderedOutput::Empty))
                .count(),
            _ => 0,
        }
    }
}

const PAGE_STYLE: &str = "body{font-family:sans-serif;max-width:60rem;margin:2rem auto;}\
.cell{margin:1rem 0;}.prompt{color:#888;font-family:monospace;}\
pre{background:#f6f8fa;padding:.5rem;overflow-x:auto;}pre.output.error{background:#fdecea;}\
.tok-comment{color:#6a737d;}.tok-string{color:#032f62;}.tok-number{color:#005cc5;}\
.tok-keyword{color:#d73a49;}.tok-function{color:#6f42c1;}";

impl RenderedView {
    /// HTML fragment for the current view
    pub fn to_html(&self) -> String {
        match self {
            RenderedView::NoDocument => {
                "<div class=\"notebook-empty\">No notebook selected</div>".to_string()
            }
            RenderedView::Document { cells, .. } => {
                let body: String = cells.iter().map(RenderedCell::to_html).collect();
                format!("<div class=\"notebook\">{body}</div>")
            }
        }
    }

    /// Standalone HTML page for exporting
    pub fn to_html_page(&self) -> String {
        let title = match self {
            RenderedView::NoDocument => "Notebook",
            RenderedView::Document { name, .. } => name.as_str(),
        };
        format!(
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{}</title><style>{PAGE_STYLE}</style></head><body>{}</body></html>\n",
            escape_html(title),
            self.to_html()
        )
    }

    pub fn cells(&self) -> &[RenderedCell] {
        match self {
            RenderedView::NoDocument => &[],
            RenderedView::Document { cells, .. } => cells,
        }
    }
}
