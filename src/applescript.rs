//! AppleScript text handling and the `osascript` runner
//!
//! Provides the escaping rules for string literals embedded in generated
//! scripts, a parser for `osascript -s s` structured output, and the
//! [`ScriptRunner`] seam that the bridge executes scripts through.

use std::iter::Peekable;
use std::path::PathBuf;
use std::process::Stdio;
use std::str::Chars;

use regex::Regex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::errors::{AppError, AppResult};

/// Escape a value for embedding inside an AppleScript string literal
///
/// Backslash is replaced first so the escapes introduced by the later
/// substitutions are not doubled.
pub fn escape_string(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Inverse of [`escape_string`]
///
/// Also used to decode string literals printed by `osascript -s s`. Unknown
/// escape sequences are kept as written.
pub fn unescape_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Escape and wrap a value as an AppleScript string literal
pub fn quoted(input: &str) -> String {
    format!("\"{}\"", escape_string(input))
}

/// A value returned by a script
///
/// `osascript -s s` prints results in AppleScript source form: quoted
/// strings, bare atoms (numbers, booleans, constants, dates) and braced
/// lists, possibly nested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptValue {
    /// Quoted string literal, already unescaped
    Text(String),
    /// Bare token such as `42`, `true`, `from header` or `date "..."`
    Atom(String),
    /// Braced list
    List(Vec<ScriptValue>),
    /// `missing value` or empty output
    Missing,
}

impl ScriptValue {
    /// Parse structured `osascript` output
    pub fn parse(output: &str) -> Self {
        let trimmed = output.trim();
        if trimmed.is_empty() {
            return Self::Missing;
        }
        Parser {
            chars: trimmed.chars().peekable(),
        }
        .value()
    }

    /// Scalar text of the value
    ///
    /// Lists and `missing value` have no text form and yield an empty string.
    pub fn into_text(self) -> String {
        self.into_scalar().unwrap_or_default()
    }

    /// Scalar items of a list result
    ///
    /// Nested lists and `missing value` items are dropped. A scalar result is
    /// treated as a single-item list.
    pub fn into_items(self) -> Vec<String> {
        match self {
            Self::List(items) => items.into_iter().filter_map(Self::into_scalar).collect(),
            other => other.into_scalar().into_iter().collect(),
        }
    }

    /// Positional cells of a single record returned as a list
    ///
    /// Unlike [`ScriptValue::into_items`], every position is kept so callers
    /// can address fields by index.
    pub fn into_cells(self) -> Vec<String> {
        match self {
            Self::List(items) => items.into_iter().map(Self::into_text).collect(),
            Self::Missing => Vec::new(),
            scalar => vec![scalar.into_text()],
        }
    }

    /// Rows of a list-of-lists result
    pub fn into_rows(self) -> Vec<Vec<String>> {
        match self {
            Self::List(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Self::List(cells) => Some(cells.into_iter().map(Self::into_text).collect()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn into_scalar(self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s),
            Self::Atom(a) => Some(atom_text(a)),
            Self::List(_) | Self::Missing => None,
        }
    }
}

/// Display text of a bare atom; date literals carry it in quotes
fn atom_text(atom: String) -> String {
    if let Some(inner) = atom
        .strip_prefix("date \"")
        .and_then(|rest| rest.strip_suffix('"'))
    {
        return unescape_string(inner);
    }
    atom
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
}

impl Parser<'_> {
    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|ch| ch.is_whitespace()).is_some() {}
    }

    fn value(&mut self) -> ScriptValue {
        self.skip_whitespace();
        match self.chars.peek() {
            Some('{') => {
                self.chars.next();
                self.list()
            }
            Some('"') => {
                self.chars.next();
                ScriptValue::Text(self.string_body())
            }
            Some(_) => self.atom(),
            None => ScriptValue::Missing,
        }
    }

    fn list(&mut self) -> ScriptValue {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.chars.peek() {
                None => break,
                Some('}') => {
                    self.chars.next();
                    break;
                }
                Some(',') => {
                    self.chars.next();
                }
                Some(_) => items.push(self.value()),
            }
        }
        ScriptValue::List(items)
    }

    /// Read up to the closing quote; the opening quote is already consumed
    fn string_body(&mut self) -> String {
        let mut raw = String::new();
        while let Some(ch) = self.chars.next() {
            match ch {
                '\\' => {
                    raw.push(ch);
                    if let Some(next) = self.chars.next() {
                        raw.push(next);
                    }
                }
                '"' => break,
                _ => raw.push(ch),
            }
        }
        unescape_string(&raw)
    }

    /// Read a bare token up to the next separator outside quotes and braces
    fn atom(&mut self) -> ScriptValue {
        let mut raw = String::new();
        let mut depth = 0usize;
        let mut in_quotes = false;
        while let Some(&ch) = self.chars.peek() {
            if !in_quotes && depth == 0 && (ch == ',' || ch == '}') {
                break;
            }
            self.chars.next();
            raw.push(ch);
            match ch {
                '\\' if in_quotes => {
                    if let Some(next) = self.chars.next() {
                        raw.push(next);
                    }
                }
                '"' => in_quotes = !in_quotes,
                '{' if !in_quotes => depth += 1,
                '}' if !in_quotes => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        match raw.trim() {
            "missing value" => ScriptValue::Missing,
            token => ScriptValue::Atom(token.to_owned()),
        }
    }
}

/// Executes AppleScript source against the mail application
///
/// Implementations run exactly one script per call. Serialization of calls is
/// the bridge's job, not the runner's.
pub trait ScriptRunner: Send + Sync + 'static {
    /// Compile and run `source`, returning its result
    fn run(&self, source: &str) -> impl Future<Output = AppResult<ScriptValue>> + Send;
}

/// Runs scripts through the `osascript` command line tool
///
/// Scripts are written to stdin and results are requested in structured
/// source form (`-s s`) so lists and strings can be told apart.
#[derive(Debug, Clone)]
pub struct Osascript {
    /// Path to the `osascript` executable
    program: PathBuf,
    /// Matches `[n:m: ]execution error: <message> (<code>)` on stderr
    failure_pattern: Regex,
}

impl Osascript {
    /// Create a runner for the given `osascript` executable
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the stderr pattern fails to compile.
    pub fn new(program: impl Into<PathBuf>) -> AppResult<Self> {
        let failure_pattern = Regex::new(
            r"(?s)^(?:\d+:\d+:\s*)?(execution error|syntax error):\s*(.*?)\s*\((-?\d+)\)\s*$",
        )
        .map_err(|e| AppError::Internal(format!("invalid osascript error regex: {e}")))?;
        Ok(Self {
            program: program.into(),
            failure_pattern,
        })
    }

    /// Map `osascript` stderr to a script error
    fn parse_failure(&self, stderr: &str) -> AppError {
        let text = stderr.trim();
        let Some(caps) = self.failure_pattern.captures(text) else {
            let message = if text.is_empty() {
                "Unknown AppleScript error"
            } else {
                text
            };
            return AppError::script(message, -1);
        };

        let message = caps[2].to_owned();
        let code = caps[3].parse::<i64>().unwrap_or(-1);
        if &caps[1] == "syntax error" {
            AppError::ScriptCreationFailed(format!("{message} ({code})"))
        } else {
            AppError::script(message, code)
        }
    }
}

impl ScriptRunner for Osascript {
    async fn run(&self, source: &str) -> AppResult<ScriptValue> {
        let mut child = Command::new(&self.program)
            .arg("-s")
            .arg("s")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                AppError::Internal(format!(
                    "failed to spawn {}: {e}",
                    self.program.display()
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(source.as_bytes())
                .await
                .map_err(|e| AppError::Internal(format!("failed to write script: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AppError::Internal(format!("failed to wait for osascript: {e}")))?;

        if output.status.success() {
            Ok(ScriptValue::parse(&String::from_utf8_lossy(&output.stdout)))
        } else {
            Err(self.parse_failure(&String::from_utf8_lossy(&output.stderr)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Osascript, ScriptValue, escape_string, quoted, unescape_string};
    use crate::errors::AppError;

    #[test]
    fn escapes_backslash_before_other_sequences() {
        assert_eq!(escape_string(r#"a\"b"#), r#"a\\\"b"#);
        assert_eq!(escape_string("line1\nline2\r\tend"), r"line1\nline2\r\tend");
        assert_eq!(escape_string(r"C:\new"), r"C:\\new");
    }

    #[test]
    fn unescape_reverses_escape() {
        let samples = [
            "",
            "plain",
            r#"say "hi""#,
            r"back\slash",
            "tab\tnew\nline\rreturn",
            r"\n literal backslash-n",
            "\\\"\n\r\t\\\\",
            "trailing\\",
            "unicode ✓ \"quoted\"",
        ];
        for sample in samples {
            assert_eq!(unescape_string(&escape_string(sample)), sample, "{sample:?}");
        }
    }

    #[test]
    fn quoted_wraps_escaped_literal() {
        assert_eq!(quoted(r#"Work "Inbox""#), r#""Work \"Inbox\"""#);
    }

    #[test]
    fn parses_flat_string_list() {
        let value = ScriptValue::parse(r#"{"Work", "Home \"2\"", "a, b"}"#);
        assert_eq!(value.into_items(), vec!["Work", "Home \"2\"", "a, b"]);
    }

    #[test]
    fn list_items_drop_missing_values_and_nested_lists() {
        let value = ScriptValue::parse(r#"{"a", missing value, 42, {"x"}, true}"#);
        assert_eq!(value.into_items(), vec!["a", "42", "true"]);
    }

    #[test]
    fn scalar_output_yields_text() {
        assert_eq!(ScriptValue::parse("\"Email deleted\"\n").into_text(), "Email deleted");
        assert_eq!(ScriptValue::parse("17").into_text(), "17");
        assert_eq!(ScriptValue::parse("missing value").into_text(), "");
        assert_eq!(ScriptValue::parse("").into_items(), Vec::<String>::new());
        assert_eq!(ScriptValue::parse("{\"a\"}").into_text(), "");
    }

    #[test]
    fn date_atoms_expose_display_text() {
        let value = ScriptValue::parse(r#"{date "Monday, 6 January 2025 at 09:00:00", "x"}"#);
        assert_eq!(
            value.into_cells(),
            vec!["Monday, 6 January 2025 at 09:00:00", "x"]
        );
    }

    #[test]
    fn parses_rows_and_keeps_missing_cells() {
        let value = ScriptValue::parse(
            r#"{{"101", "Hello", "a@example.com"}, {"102", missing value, "b@example.com"}}"#,
        );
        assert_eq!(
            value.into_rows(),
            vec![
                vec!["101", "Hello", "a@example.com"],
                vec!["102", "", "b@example.com"],
            ]
        );
        assert!(ScriptValue::parse("{}").into_rows().is_empty());
    }

    #[test]
    fn parses_constants_with_spaces() {
        let value = ScriptValue::parse("{from header, does contain value, \"boss\"}");
        assert_eq!(
            value.into_cells(),
            vec!["from header", "does contain value", "boss"]
        );
    }

    #[test]
    fn maps_execution_error_to_message_and_code() {
        let runner = Osascript::new("/usr/bin/osascript").expect("regex must compile");
        let err = runner.parse_failure(
            "0:93: execution error: Mail got an error: Can’t get account \"Nope\". (-1728)\n",
        );
        match err {
            AppError::ScriptExecutionFailed { message, code } => {
                assert_eq!(message, "Mail got an error: Can’t get account \"Nope\".");
                assert_eq!(code, -1728);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn maps_syntax_error_to_creation_failure() {
        let runner = Osascript::new("/usr/bin/osascript").expect("regex must compile");
        let err = runner.parse_failure("12:20: syntax error: Expected end of line. (-2741)");
        assert!(matches!(err, AppError::ScriptCreationFailed(_)));
        assert!(err.to_string().contains("-2741"));
    }

    #[test]
    fn unrecognized_stderr_is_reported_verbatim() {
        let runner = Osascript::new("/usr/bin/osascript").expect("regex must compile");
        let err = runner.parse_failure("something odd");
        assert_eq!(err.to_string(), "AppleScript error (-1): something odd");
    }
}
