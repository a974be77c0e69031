//! Recorded edge trace parsing.
//!
//! One event per line:
//!
//! ```text
//! # timestamp_ms  monitor  edge
//! 1000            wheel    primary
//! 1030            wheel    s
//! ```
//!
//! `edge` is `primary`/`p` or `secondary`/`s`. Blank lines and `#`
//! comments are skipped.

use std::fmt;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;
use twinpulse_common::time::Timestamp;

/// Trace reading errors.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Malformed line.
    #[error("line {line}: {message}")]
    Syntax {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        message: String,
    },

    /// Underlying reader failed.
    #[error("failed to read trace at line {line}: {source}")]
    Io {
        /// 1-based line number.
        line: usize,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Which sensor produced an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Counted channel.
    Primary,
    /// Direction reference channel.
    Secondary,
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "p" | "primary" => Ok(Self::Primary),
            "s" | "secondary" => Ok(Self::Secondary),
            other => Err(format!("unknown edge {other:?}, expected primary or secondary")),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
        }
    }
}

/// One recorded edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    /// 1-based source line.
    pub line: usize,
    /// Edge timestamp.
    pub at: Timestamp,
    /// Monitor the edge belongs to.
    pub monitor: String,
    /// Channel the edge arrived on.
    pub channel: Channel,
}

/// Parse a single trace line. Returns `Ok(None)` for blanks and comments.
///
/// # Errors
///
/// Returns [`TraceError::Syntax`] if the line does not have exactly three
/// fields, the timestamp is not a `u32`, or the edge is unknown.
pub fn parse_line(line: usize, text: &str) -> Result<Option<TraceEvent>, TraceError> {
    let content = text.split('#').next().unwrap_or("").trim();
    if content.is_empty() {
        return Ok(None);
    }

    let syntax = |message: String| TraceError::Syntax { line, message };

    let fields: Vec<&str> = content.split_whitespace().collect();
    let [at, monitor, edge] = fields.as_slice() else {
        return Err(syntax(format!(
            "expected `<timestamp_ms> <monitor> <edge>`, got {} field(s)",
            fields.len()
        )));
    };

    let at = at
        .parse::<u32>()
        .map_err(|e| syntax(format!("invalid timestamp {at:?}: {e}")))?;
    let channel = edge.parse::<Channel>().map_err(syntax)?;

    Ok(Some(TraceEvent {
        line,
        at: Timestamp(at),
        monitor: (*monitor).to_string(),
        channel,
    }))
}

/// Iterator over the events of a trace.
pub struct TraceReader<R> {
    lines: std::io::Lines<R>,
    line: usize,
}

impl<R: BufRead> TraceReader<R> {
    /// Read events from `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<TraceEvent, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = self.lines.next()?;
            self.line += 1;
            let text = match text {
                Ok(text) => text,
                Err(source) => {
                    return Some(Err(TraceError::Io {
                        line: self.line,
                        source,
                    }))
                }
            };
            match parse_line(self.line, &text) {
                Ok(Some(event)) => return Some(Ok(event)),
                Ok(None) => {}
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
