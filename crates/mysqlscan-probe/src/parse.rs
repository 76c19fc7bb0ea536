//! Line-level helpers shared by the table parsers.

use thiserror::Error;

/// Why a single row of a command's output was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// Fewer whitespace-separated fields than the grammar requires
    #[error("expected at least {expected} fields, found {found}")]
    TooFewFields {
        /// Required field count
        expected: usize,
        /// Fields actually present
        found: usize,
    },

    /// A numeric column held something else
    #[error("{column} is not a number: {value:?}")]
    NotANumber {
        /// Column name
        column: &'static str,
        /// Raw field text
        value: String,
    },

    /// A required marker or separator is missing
    #[error("missing {0}")]
    Missing(&'static str),

    /// Well-formed row whose owning process is hidden from the caller
    /// (netstat prints `-`, ss omits `users:(...)` without privileges)
    #[error("owner not visible")]
    Unowned,
}

/// Split off the first `n` whitespace-separated fields and return them with
/// the untouched remainder of the line.
pub(crate) fn split_leading_fields(line: &str, n: usize) -> Result<(Vec<&str>, &str), RowError> {
    let mut fields = Vec::with_capacity(n);
    let mut rest = line.trim_start();
    while fields.len() < n {
        if rest.is_empty() {
            return Err(RowError::TooFewFields {
                expected: n + 1,
                found: fields.len(),
            });
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        fields.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    Ok((fields, rest.trim_end()))
}

/// Parse a process id column.
pub(crate) fn parse_pid(column: &'static str, value: &str) -> Result<u32, RowError> {
    value.parse::<u32>().map_err(|_| RowError::NotANumber {
        column,
        value: value.to_string(),
    })
}
