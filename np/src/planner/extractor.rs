//! Structured-data extractor
//!
//! Recovers one JSON document, plus any free-text reasoning, from a model
//! response. Strategies run in order and the first parseable candidate wins:
//!
//! 1. fenced blocks whose info string is empty or `json`
//! 2. the first balanced object containing the marker key (`"nodes"` by default)
//! 3. a depth-tracked brace scan over the whole text
//!
//! Everything here is a pure function of the input text.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

const FENCE: &str = "```";

/// Why no JSON document could be recovered
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// Nothing in the text looked like a JSON document
    #[error("no JSON found")]
    NoJson,

    /// Candidate spans were found but none parsed
    #[error("malformed JSON: {detail}")]
    Malformed { detail: String },
}

impl ExtractionError {
    /// Short reason without detail
    pub fn reason(&self) -> &'static str {
        match self {
            ExtractionError::NoJson => "no JSON found",
            ExtractionError::Malformed { .. } => "malformed JSON",
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            ExtractionError::NoJson => None,
            ExtractionError::Malformed { detail } => Some(detail),
        }
    }
}

/// A recovered document
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// The document text exactly as it appeared (trimmed)
    pub json: String,
    /// The parsed document
    pub value: Value,

    /// Best-effort reasoning text; empty when none was found
    pub reasoning: String,
}

/// JSON extractor with a configurable marker key for the keyed-object strategy
#[derive(Debug, Clone)]
pub struct Extractor {
    marker: Option<String>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::with_marker_key("nodes")
    }
}

impl Extractor {
    /// Extractor whose keyed strategy looks for `"key"`
    pub fn with_marker_key(key: &str) -> Self {
        Self {
            marker: Some(format!("\"{}\"", key)),
        }
    }

    /// Extractor that skips the keyed strategy
    pub fn without_marker() -> Self {
        Self { marker: None }
    }

    /// Extract the JSON document and reasoning from `text`
    pub fn extract(&self, text: &str) -> Result<Extraction, ExtractionError> {
        debug!(text_len = text.len(), "Extractor::extract: called");
        let mut scan = Scan::default();

        let found = self
            .from_fences(text, &mut scan)
            .or_else(|| self.from_keyed_object(text, &mut scan))
            .or_else(|| from_brace_scan(text, &mut scan));

        match found {
            Some((json, value)) => {
                debug!(json_len = json.len(), "Extractor::extract: found document");
                Ok(Extraction {
                    json: json.to_string(),
                    value,
                    reasoning: extract_reasoning(text),
                })
            }
            None => {
                let err = scan.into_error();
                debug!(error = %err, "Extractor::extract: nothing parsed");
                Err(err)
            }
        }
    }

    fn from_fences<'a>(&self, text: &'a str, scan: &mut Scan) -> Option<(&'a str, Value)> {
        fenced_blocks(text).into_iter().find_map(|block| scan.try_parse(block))
    }

    fn from_keyed_object<'a>(&self, text: &'a str, scan: &mut Scan) -> Option<(&'a str, Value)> {
        let marker = self.marker.as_deref()?;
        text.match_indices('{').find_map(|(start, _)| {
            let end = balanced_end(text, start)?;
            let span = &text[start..end];
            if span.contains(marker) { scan.try_parse(span) } else { None }
        })
    }
}

/// Bookkeeping for the error reported when every strategy fails
#[derive(Debug, Default)]
struct Scan {
    first_parse_error: Option<String>,
    unterminated: bool,
}

impl Scan {
    fn try_parse<'a>(&mut self, candidate: &'a str) -> Option<(&'a str, Value)> {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => Some((candidate, value)),
            Err(e) => {
                if self.first_parse_error.is_none() {
                    self.first_parse_error = Some(e.to_string());
                }
                None
            }
        }
    }

    fn into_error(self) -> ExtractionError {
        match self.first_parse_error {
            Some(detail) => ExtractionError::Malformed { detail },
            None if self.unterminated => ExtractionError::Malformed {
                detail: "unterminated JSON object".to_string(),
            },
            None => ExtractionError::NoJson,
        }
    }
}

/// Trimmed bodies of fenced blocks tagged `json` or untagged, in order
fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find(FENCE) {
        let after_open = &rest[open + FENCE.len()..];
        let Some(eol) = after_open.find('\n') else {
            break;
        };
        if let Some(inline_close) = after_open[..eol].find(FENCE) {
            rest = &after_open[inline_close + FENCE.len()..];
            continue;
        }
        let info = after_open[..eol].trim();
        let body = &after_open[eol + 1..];
        let Some(close) = body.find(FENCE) else {
            break;
        };
        if info.is_empty() || info.eq_ignore_ascii_case("json") {
            blocks.push(body[..close].trim());
        }
        rest = &body[close + FENCE.len()..];
    }
    blocks
}

/// Depth-tracked scan: every balanced `{...}` span, first parseable wins
///
/// Text between spans is prose, so quote state is only tracked inside braces
/// and a stray `}` at depth zero is ignored. A `{` that never closes (a quoted
/// brace in prose, say) is skipped and the scan resumes just after it.
fn from_brace_scan<'a>(text: &'a str, scan: &mut Scan) -> Option<(&'a str, Value)> {
    let mut pos = 0;
    while let Some(rel) = text[pos..].find('{') {
        let start = pos + rel;
        match balanced_end(text, start) {
            Some(end) => {
                if let Some(found) = scan.try_parse(&text[start..end]) {
                    return Some(found);
                }
                pos = end;
            }
            None => {
                scan.unterminated = true;
                pos = start + 1;
            }
        }
    }
    None
}

/// Byte index just past the `}` closing the object that opens at `start`
///
/// `text[start..]` must begin with `{`. Braces inside string literals do not
/// count and a backslash inside a string escapes the next character.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// A reasoning label and the rules for reading the text after it
struct ReasoningLabel {
    label: &'static str,
    is_separator: fn(char) -> bool,
    stops: &'static [&'static str],
}

fn is_field_separator(c: char) -> bool {
    c == '"' || c == ':' || c.is_whitespace()
}

fn is_label_separator(c: char) -> bool {
    c == ':' || c.is_whitespace()
}

const REASONING_LABELS: &[ReasoningLabel] = &[
    ReasoningLabel {
        label: "reasoning",
        is_separator: is_field_separator,
        stops: &["{", FENCE],
    },
    ReasoningLabel {
        label: "Reasoning",
        is_separator: is_label_separator,
        stops: &["{", FENCE],
    },
    ReasoningLabel {
        label: "## Reasoning",
        is_separator: char::is_whitespace,
        stops: &["#"],
    },
];

/// Best-effort reasoning text; labels are tried in order, empty when none match
pub fn extract_reasoning(text: &str) -> String {
    REASONING_LABELS
        .iter()
        .find_map(|label| label.find_in(text))
        .unwrap_or_default()
}

impl ReasoningLabel {
    fn find_in(&self, text: &str) -> Option<String> {
        let mut from = 0;
        while let Some(rel) = text[from..].find(self.label) {
            let after = from + rel + self.label.len();
            let rest = &text[after..];
            let sep_len: usize = rest
                .chars()
                .take_while(|c| (self.is_separator)(*c))
                .map(char::len_utf8)
                .sum();
            if sep_len > 0 {
                let body = &rest[sep_len..];
                let end = self
                    .stops
                    .iter()
                    .filter_map(|stop| body.find(stop))
                    .min()
                    .unwrap_or(body.len());
                let cleaned = clean_reasoning(&body[..end]);
                if !cleaned.is_empty() {
                    return Some(cleaned);
                }
            }
            from = after;
        }
        None
    }
}

fn clean_reasoning(raw: &str) -> String {
    raw.trim().trim_matches(|c| c == '"' || c == '\'').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn extract(text: &str) -> Result<Extraction, ExtractionError> {
        Extractor::default().extract(text)
    }

    #[test]
    fn test_clean_json_returned_unchanged() {
        let text = r#"{"nodes": [{"id": "a"}], "edges": []}"#;
        let out = extract(text).unwrap();
        assert_eq!(out.json, text);
        assert_eq!(out.value, json!({"nodes": [{"id": "a"}], "edges": []}));
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let text = r#"Here you go: {"note": "a { b } c"} hope that helps"#;
        let out = extract(text).unwrap();
        assert_eq!(out.json, r#"{"note": "a { b } c"}"#);
    }

    #[test]
    fn test_escaped_quote_does_not_end_string() {
        let text = r#"Result {"say": "he said \"}\" loudly", "n": 1} done"#;
        let out = extract(text).unwrap();
        assert_eq!(out.value["n"], 1);
    }

    #[test]
    fn test_fenced_block_preferred_over_loose_span() {
        let text = "Draft {\"nodes\": [\"draft\"]}\n\n```json\n{\"nodes\": [\"final\"]}\n```\n";
        let out = extract(text).unwrap();
        assert_eq!(out.value, json!({"nodes": ["final"]}));
    }

    #[test]
    fn test_untagged_fence_accepted_and_other_languages_skipped() {
        let text = "```python\nprint({'a': 1})\n```\n```\n{\"nodes\": []}\n```";
        let out = extract(text).unwrap();
        assert_eq!(out.json, "{\"nodes\": []}");
    }

    #[test]
    fn test_uppercase_json_fence_accepted() {
        let text = "```JSON\n  {\"a\": 1}  \n```";
        assert_eq!(extract(text).unwrap().json, "{\"a\": 1}");
    }

    #[test]
    fn test_invalid_fence_falls_through_to_loose_span() {
        let text = "```json\n{nodes: oops}\n```\nActually: {\"nodes\": []}";
        assert_eq!(extract(text).unwrap().json, "{\"nodes\": []}");
    }

    #[test]
    fn test_keyed_object_preferred_over_earlier_span() {
        let text = r#"Config {"mode": "fast"} and graph {"nodes": [], "edges": []}"#;
        let out = extract(text).unwrap();
        assert_eq!(out.value, json!({"nodes": [], "edges": []}));
    }

    #[test]
    fn test_without_marker_takes_first_span() {
        let text = r#"Config {"mode": "fast"} and graph {"nodes": []}"#;
        let out = Extractor::without_marker().extract(text).unwrap();
        assert_eq!(out.value, json!({"mode": "fast"}));
    }

    #[test]
    fn test_span_at_start_of_text() {
        let out = extract("{\"a\": 1} trailing prose").unwrap();
        assert_eq!(out.json, "{\"a\": 1}");
    }

    #[test]
    fn test_stray_closing_brace_in_prose() {
        let out = extract("oops } then {\"a\": 2}").unwrap();
        assert_eq!(out.value["a"], 2);
    }

    #[test]
    fn test_broken_span_then_good_span() {
        let out = extract("{not json} and {\"ok\": true}").unwrap();
        assert_eq!(out.value["ok"], true);
    }

    #[test]
    fn test_quoted_brace_in_prose_does_not_hide_object() {
        let out = extract(r#"The user wrote "open {" in the ticket. Graph: {"a": 1}"#).unwrap();
        assert_eq!(out.json, r#"{"a": 1}"#);
    }

    #[test]
    fn test_unclosed_brace_in_prose_then_object() {
        let out = extract(r#"Use the { character for maps. Graph: {"a": 1}"#).unwrap();
        assert_eq!(out.value, json!({"a": 1}));
    }

    #[test]
    fn test_inline_fence_does_not_swallow_json_block() {
        let text = "Example {\"b\": 2} uses ```inline``` code.\n```json\n{\"a\": 1}\n```\n";
        let out = extract(text).unwrap();
        assert_eq!(out.value, json!({"a": 1}));
    }

    #[test]
    fn test_no_json() {
        let err = extract("I cannot help with that.").unwrap_err();
        assert_eq!(err, ExtractionError::NoJson);
        assert_eq!(err.to_string(), "no JSON found");
        assert_eq!(err.reason(), "no JSON found");
        assert!(err.detail().is_none());
    }

    #[test]
    fn test_malformed_json_with_prose() {
        let err = extract("Sure! Here is the graph: {nodes: [a, b], edges: } Let me know.").unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed { .. }));
        assert_eq!(err.reason(), "malformed JSON");
        assert!(err.detail().is_some());
    }

    #[test]
    fn test_unterminated_object_is_malformed() {
        let err = extract("Graph: {\"nodes\": [").unwrap_err();
        assert_eq!(
            err,
            ExtractionError::Malformed {
                detail: "unterminated JSON object".to_string()
            }
        );
    }

    #[test]
    fn test_reasoning_label_before_fence() {
        let text = "Reasoning: Two nodes, one router.\n\n```json\n{\"nodes\": []}\n```";
        let out = extract(text).unwrap();
        assert_eq!(out.reasoning, "Two nodes, one router.");
    }

    #[test]
    fn test_reasoning_json_field() {
        assert_eq!(
            extract_reasoning(r#"reasoning: "keep it small" {"nodes": []}"#),
            "keep it small"
        );
    }

    #[test]
    fn test_reasoning_markdown_heading() {
        let text = "## Reasoning\nSplit by sentiment first.\n## Graph\n";
        // "Reasoning" followed by whitespace matches before the heading form
        assert_eq!(extract_reasoning(text), "Split by sentiment first.\n## Graph");
        assert_eq!(extract_reasoning("## Reasoning\nonly heading {"), "only heading");
    }

    #[test]
    fn test_no_reasoning_is_empty() {
        assert_eq!(extract_reasoning("{\"nodes\": []}"), "");
        assert_eq!(extract("{\"nodes\": []}").unwrap().reasoning, "");
    }

    #[test]
    fn test_reasoning_skips_empty_match() {
        // first "reasoning" is followed directly by a brace, the second has text
        let text = "reasoning {} and later reasoning: real text {";
        assert_eq!(extract_reasoning(text), "real text");
    }

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-zA-Z0-9 {}\\[\\]\"\\\\:,]{0,12}".prop_map(Value::String),
            Just(Value::Null),
        ]
    }

    fn json_value() -> impl Strategy<Value = Value> {
        leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    fn json_object() -> impl Strategy<Value = Value> {
        prop::collection::btree_map("[a-z]{1,6}", json_value(), 0..5).prop_map(|m| Value::Object(m.into_iter().collect()))
    }

    proptest! {
        #[test]
        fn prop_clean_object_is_idempotent(value in json_object(), pretty in any::<bool>()) {
            let text = if pretty {
                serde_json::to_string_pretty(&value).unwrap()
            } else {
                serde_json::to_string(&value).unwrap()
            };
            let out = extract(&text).unwrap();
            prop_assert_eq!(&out.json, &text);
            prop_assert_eq!(&out.value, &value);
        }

        #[test]
        fn prop_object_found_inside_prose(value in json_object(), prefix in "[a-zA-Z .,!]{0,40}", suffix in "[a-zA-Z .,!]{0,40}") {
            let body = serde_json::to_string(&value).unwrap();
            let text = format!("{}{}{}", prefix, body, suffix);
            let out = extract(&text).unwrap();
            prop_assert_eq!(&out.value, &value);
        }
    }
}
