//! In-memory notebook document model and `.ipynb` decoding

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde_json::{Map, Value};

use super::error::{NotebookError, Result};

/// Opaque string-keyed bag of text sequences.
///
/// Used for notebook metadata and output payloads alike; values that are not
/// strings in the source file are kept as their JSON serialization.
pub type TextMap = BTreeMap<String, Vec<String>>;

/// Notebook-level metadata
pub type Metadata = TextMap;

/// Output payload keyed by MIME type (`text/plain`, `image/png`, ...)
pub type MimeBundle = TextMap;

/// Notebook format version (`nbformat`, `nbformat_minor`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
}

impl Default for FormatVersion {
    fn default() -> Self {
        Self { major: 4, minor: 0 }
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A parsed notebook. Cell order is display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotebookDocument {
    pub metadata: Metadata,
    pub format: FormatVersion,
    pub cells: Vec<Cell>,
}

/// A single notebook cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Markdown {
        source: Vec<String>,
    },
    Code {
        source: Vec<String>,
        /// `None` until the cell has been executed
        execution_count: Option<u64>,
        outputs: Vec<Output>,
    },
    /// Any other cell type (`raw`, or a tag this viewer does not know)
    Unknown {
        cell_type: String,
        source: Vec<String>,
    },
}

impl Cell {
    pub fn markdown<S: Into<String>>(source: impl IntoIterator<Item = S>) -> Self {
        Self::Markdown {
            source: source.into_iter().map(Into::into).collect(),
        }
    }

    pub fn code<S: Into<String>>(
        source: impl IntoIterator<Item = S>,
        execution_count: Option<u64>,
        outputs: Vec<Output>,
    ) -> Self {
        Self::Code {
            source: source.into_iter().map(Into::into).collect(),
            execution_count,
            outputs,
        }
    }

    /// Source fragments of the cell
    pub fn source(&self) -> &[String] {
        match self {
            Cell::Markdown { source } | Cell::Code { source, .. } | Cell::Unknown { source, .. } => {
                source
            }
        }
    }

    /// Source fragments concatenated into the cell body
    pub fn joined_source(&self) -> String {
        self.source().concat()
    }

    /// The nbformat tag of this cell
    pub fn type_name(&self) -> &str {
        match self {
            Cell::Markdown { .. } => "markdown",
            Cell::Code { .. } => "code",
            Cell::Unknown { cell_type, .. } => cell_type,
        }
    }
}

/// Kind of a code cell output
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputType {
    /// No `output_type` field present
    #[default]
    Unspecified,
    Stream {
        name: String,
    },
    DisplayData,
    ExecuteResult,
    Error,
    Other(String),
}

/// One captured output of a code cell
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Output {
    pub output_type: OutputType,
    pub data: MimeBundle,
}

impl Output {
    /// Output carrying a single `text/plain` representation
    pub fn text<S: Into<String>>(fragments: impl IntoIterator<Item = S>) -> Self {
        let mut data = MimeBundle::new();
        data.insert(
            "text/plain".to_string(),
            fragments.into_iter().map(Into::into).collect(),
        );
        Self {
            output_type: OutputType::Unspecified,
            data,
        }
    }

    fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let output_type = match obj.get("output_type").and_then(Value::as_str) {
            None => OutputType::Unspecified,
            Some("stream") => OutputType::Stream {
                name: obj
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("stdout")
                    .to_string(),
            },
            Some("display_data") => OutputType::DisplayData,
            Some("execute_result") => OutputType::ExecuteResult,
            Some("error") => OutputType::Error,
            Some(other) => OutputType::Other(other.to_string()),
        };

        let mut data = obj.get("data").map(text_map).unwrap_or_default();

        match output_type {
            OutputType::Stream { .. } => {
                if let Some(text) = obj.get("text") {
                    data.entry("text/plain".to_string())
                        .or_insert_with(|| text_fragments(text));
                }
            }
            OutputType::Error => {
                let ename = obj.get("ename").and_then(Value::as_str).unwrap_or("Error");
                let evalue = obj.get("evalue").and_then(Value::as_str).unwrap_or_default();
                let mut lines = vec![format!("{ename}: {evalue}")];
                if let Some(traceback) = obj.get("traceback") {
                    lines.extend(text_fragments(traceback).iter().map(|l| strip_ansi(l)));
                }
                data.entry("text/plain".to_string())
                    .or_insert_with(|| vec![lines.join("\n")]);
            }
            _ => {}
        }

        Self { output_type, data }
    }
}

impl NotebookDocument {
    /// Demonstration document used when no real notebook content is available
    pub fn placeholder(title: &str) -> Self {
        Self {
            metadata: Metadata::new(),
            format: FormatVersion { major: 4, minor: 5 },
            cells: vec![
                Cell::markdown([
                    format!("# {title}\n"),
                    "\n".to_string(),
                    "This is a demonstration of the notebook renderer. In a real application, this would load the actual .ipynb JSON content.".to_string(),
                ]),
                Cell::code(
                    [
                        "import numpy as np\n",
                        "import pandas as pd\n",
                        "import matplotlib.pyplot as plt\n",
                        "\n",
                        "print('Environment ready!')",
                    ],
                    Some(1),
                    vec![Output::text(["Environment ready!"])],
                ),
                Cell::markdown([
                    "### Data Loading\n",
                    "Loading environmental sensor data from CSV...",
                ]),
                Cell::code(
                    [
                        "# Simulating data load\n",
                        "data = np.random.randn(100, 3)\n",
                        "df = pd.DataFrame(data, columns=['Temp', 'Salinity', 'DO'])\n",
                        "df.head()",
                    ],
                    Some(2),
                    vec![Output::text([
                        "       Temp  Salinity        DO\n0  0.542 -1.231  0.432\n1 -0.123  0.882 -0.991",
                    ])],
                ),
            ],
        }
    }

    /// Decode a serialized notebook
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(&value)
    }

    /// Decode a serialized notebook held in a string
    pub fn from_json(content: &str) -> Result<Self> {
        Self::from_bytes(content.as_bytes())
    }

    fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| NotebookError::parse("top-level value is not an object"))?;

        let cells = match obj.get("cells") {
            Some(Value::Array(cells)) => cells.iter().map(parse_cell).collect(),
            Some(_) => return Err(NotebookError::parse("'cells' is not an array")),
            None => return Err(NotebookError::parse("missing required 'cells' field")),
        };

        let defaults = FormatVersion::default();
        let format = FormatVersion {
            major: read_u32(obj, "nbformat").unwrap_or(defaults.major),
            minor: read_u32(obj, "nbformat_minor").unwrap_or(defaults.minor),
        };

        let metadata = obj.get("metadata").map(text_map).unwrap_or_default();

        Ok(Self {
            metadata,
            format,
            cells,
        })
    }

    /// First metadata value under `key`
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Text of the first markdown heading, if any
    pub fn first_heading(&self) -> Option<String> {
        self.cells
            .iter()
            .filter(|cell| matches!(cell, Cell::Markdown { .. }))
            .flat_map(|cell| {
                cell.joined_source()
                    .lines()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .find_map(|line| {
                let trimmed = line.trim_start();
                let text = trimmed.trim_start_matches('#');
                if !trimmed.starts_with('#') || !text.starts_with(' ') {
                    return None;
                }
                let heading = text.trim();
                (!heading.is_empty()).then(|| heading.to_string())
            })
    }
}

fn parse_cell(value: &Value) -> Cell {
    let obj = match value.as_object() {
        Some(obj) => obj,
        None => {
            return Cell::Unknown {
                cell_type: String::new(),
                source: Vec::new(),
            }
        }
    };

    let source = obj.get("source").map(text_fragments).unwrap_or_default();

    match obj.get("cell_type").and_then(Value::as_str) {
        Some("markdown") => Cell::Markdown { source },
        Some("code") => Cell::Code {
            source,
            execution_count: obj.get("execution_count").and_then(Value::as_u64),
            outputs: obj
                .get("outputs")
                .and_then(Value::as_array)
                .map(|outputs| outputs.iter().map(Output::from_value).collect())
                .unwrap_or_default(),
        },
        other => Cell::Unknown {
            cell_type: other.unwrap_or_default().to_string(),
            source,
        },
    }
}

fn read_u32(obj: &Map<String, Value>, key: &str) -> Option<u32> {
    obj.get(key)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
}

/// nbformat "multiline string": either one string or an array of strings
fn text_fragments(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

fn text_map(value: &Value) -> TextMap {
    let Some(obj) = value.as_object() else {
        return TextMap::new();
    };

    obj.iter()
        .map(|(key, value)| {
            let fragments = match value {
                Value::String(_) => text_fragments(value),
                Value::Array(items) if items.iter().all(Value::is_string) => text_fragments(value),
                Value::Object(_) => {
                    vec![serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())]
                }
                other => vec![other.to_string()],
            };
            (key.clone(), fragments)
        })
        .collect()
}

fn strip_ansi(text: &str) -> String {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    let re = ANSI.get_or_init(|| {
        Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("ANSI escape pattern is valid")
    });
    re.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"{
        "cells": [
            {"cell_type": "markdown", "metadata": {}, "source": ["# Sea Surface\n", "Some *notes*."]},
            {"cell_type": "code", "execution_count": 3, "metadata": {}, "source": "x = 1\nx",
             "outputs": [
                {"output_type": "execute_result", "execution_count": 3, "data": {"text/plain": ["1"]}, "metadata": {}},
                {"output_type": "stream", "name": "stderr", "text": ["warn\n"]},
                {"output_type": "error", "ename": "ValueError", "evalue": "bad", "traceback": ["\u001b[0;31mValueError\u001b[0m: bad"]},
                {"output_type": "display_data", "data": {"application/json": {"a": 1}}, "metadata": {}}
             ]},
            {"cell_type": "code", "execution_count": null, "metadata": {}, "source": []},
            {"cell_type": "raw", "metadata": {}, "source": ["raw text"]}
        ],
        "metadata": {"kernelspec": {"name": "python3"}, "title": "Sea", "tags": ["ocean", "ml"]},
        "nbformat": 4,
        "nbformat_minor": 5,
        "extra_field": true
    }"##;

    #[test]
    fn test_parse_sample_notebook() {
        let doc = NotebookDocument::from_json(SAMPLE).unwrap();
        assert_eq!(doc.format, FormatVersion { major: 4, minor: 5 });
        assert_eq!(doc.cells.len(), 4);
        assert_eq!(doc.cells[0].type_name(), "markdown");
        assert_eq!(doc.cells[0].joined_source(), "# Sea Surface\nSome *notes*.");
        assert_eq!(doc.metadata_value("title"), Some("Sea"));
        assert_eq!(doc.metadata.get("tags").unwrap(), &vec!["ocean".to_string(), "ml".to_string()]);
        assert!(doc.metadata_value("kernelspec").unwrap().contains("python3"));
    }

    #[test]
    fn test_code_cell_fields() {
        let doc = NotebookDocument::from_json(SAMPLE).unwrap();
        match &doc.cells[1] {
            Cell::Code {
                source,
                execution_count,
                outputs,
            } => {
                assert_eq!(source, &vec!["x = 1\nx".to_string()]);
                assert_eq!(*execution_count, Some(3));
                assert_eq!(outputs.len(), 4);
                assert_eq!(outputs[0].output_type, OutputType::ExecuteResult);
                assert_eq!(
                    outputs[1].output_type,
                    OutputType::Stream {
                        name: "stderr".to_string()
                    }
                );
                assert_eq!(outputs[1].data["text/plain"], vec!["warn\n".to_string()]);
                assert_eq!(outputs[2].data["text/plain"], vec!["ValueError: bad\nValueError: bad".to_string()]);
                assert!(outputs[3].data["application/json"][0].contains("\"a\": 1"));
            }
            other => panic!("expected code cell, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_optional_fields_fall_back() {
        let doc = NotebookDocument::from_json(SAMPLE).unwrap();
        assert_eq!(
            doc.cells[2],
            Cell::Code {
                source: vec![],
                execution_count: None,
                outputs: vec![]
            }
        );

        let doc = NotebookDocument::from_json(r#"{"cells": [{"cell_type": "code", "source": "pass"}]}"#).unwrap();
        assert_eq!(doc.format, FormatVersion::default());
        assert!(doc.metadata.is_empty());
        match &doc.cells[0] {
            Cell::Code {
                execution_count,
                outputs,
                ..
            } => {
                assert!(execution_count.is_none());
                assert!(outputs.is_empty());
            }
            other => panic!("expected code cell, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_cell_type_is_kept() {
        let doc = NotebookDocument::from_json(SAMPLE).unwrap();
        assert_eq!(
            doc.cells[3],
            Cell::Unknown {
                cell_type: "raw".to_string(),
                source: vec!["raw text".to_string()]
            }
        );
    }

    #[test]
    fn test_missing_cells_is_parse_error() {
        let err = NotebookDocument::from_json(r#"{"metadata": {}, "nbformat": 4}"#).unwrap_err();
        assert!(err.is_parse());
        assert!(err.to_string().contains("cells"));

        let err = NotebookDocument::from_json(r#"{"cells": {}}"#).unwrap_err();
        assert!(err.is_parse());

        let err = NotebookDocument::from_json("[1, 2, 3]").unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_undecodable_is_parse_error() {
        let err = NotebookDocument::from_bytes(b"\xff\xfe not json").unwrap_err();
        assert!(matches!(err, NotebookError::Parse(_)));
    }

    #[test]
    fn test_empty_cells_is_valid() {
        let doc = NotebookDocument::from_json(r#"{"cells": []}"#).unwrap();
        assert!(doc.cells.is_empty());
    }

    #[test]
    fn test_placeholder_shape() {
        let doc = NotebookDocument::placeholder("Hypoxia Analysis");
        assert_eq!(doc.cells.len(), 4);
        assert!(doc.cells[0].joined_source().starts_with("# Hypoxia Analysis\n"));
        assert_eq!(doc.cells[1].type_name(), "code");
        assert_eq!(doc.cells[2].type_name(), "markdown");
        assert_eq!(doc.cells[3].type_name(), "code");
        assert_eq!(doc.first_heading().as_deref(), Some("Hypoxia Analysis"));
        assert_eq!(doc, NotebookDocument::placeholder("Hypoxia Analysis"));
    }

    #[test]
    fn test_first_heading_skips_empty_headings() {
        let doc = NotebookDocument {
            cells: vec![
                Cell::code(["# not a heading"], None, Vec::new()),
                Cell::markdown(["# \n", "intro text\n"]),
                Cell::markdown(["##   \n", "## Sea Surface Temperature"]),
            ],
            ..NotebookDocument::default()
        };
        assert_eq!(
            doc.first_heading().as_deref(),
            Some("Sea Surface Temperature")
        );
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\u{1b}[1;32mok\u{1b}[0m"), "ok");
    }
}
