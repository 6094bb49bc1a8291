//! Filter criteria to IMAP SEARCH query planning
//!
//! Turns free-form request input into a [`SearchQuery`]: a quoted IMAP SEARCH
//! predicate plus the canonical sort the rest of the pipeline enforces.

use std::fmt;

/// Maximum characters of filter text forwarded to the store
const MAX_FILTER_CHARS: usize = 256;

/// Field the consolidated list is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Date,
    Subject,
    From,
}

impl SortField {
    /// Map a caller-supplied sort key to a field
    ///
    /// Matching is case-insensitive; absent or unrecognized keys fall back
    /// to [`SortField::Date`].
    pub fn from_request(raw: Option<&str>) -> Self {
        match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("subject") => Self::Subject,
            Some("from") => Self::From,
            _ => Self::Date,
        }
    }

    /// IMAP sort key name (RFC 5256)
    pub fn as_imap(self) -> &'static str {
        match self {
            Self::Date => "DATE",
            Self::Subject => "SUBJECT",
            Self::From => "FROM",
        }
    }

    /// Lowercase request-facing name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Subject => "subject",
            Self::From => "from",
        }
    }
}

/// Requested sort field and direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub descending: bool,
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = if self.descending { "DESC" } else { "ASC" };
        write!(f, "{} {dir}", self.field.as_imap())
    }
}

/// Raw filter input for one consolidation request
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    pub sort_by: SortField,
    pub subject_filter: Option<String>,
    pub from_filter: Option<String>,
}

impl FilterCriteria {
    /// Build criteria from request strings; blank filters count as absent
    pub fn from_request(
        sort_by: Option<&str>,
        subject_filter: Option<&str>,
        from_filter: Option<&str>,
    ) -> Self {
        Self {
            sort_by: SortField::from_request(sort_by),
            subject_filter: non_blank(subject_filter),
            from_filter: non_blank(from_filter),
        }
    }
}

/// Store-ready search: predicate plus sort
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// IMAP SEARCH key expression (`ALL` or ANDed `SUBJECT`/`FROM` keys)
    pub predicate: String,
    pub sort: SortSpec,
}

impl SearchQuery {
    pub fn matches_all(&self) -> bool {
        self.predicate == "ALL"
    }
}

/// Plan the store query for `criteria`
///
/// IMAP ANDs juxtaposed search keys and matches `SUBJECT`/`FROM` as
/// case-insensitive substrings. Non-ASCII filter text is sent with
/// `CHARSET UTF-8`. Direction is always descending.
pub fn plan_query(criteria: &FilterCriteria) -> SearchQuery {
    let mut parts = Vec::new();
    if let Some(quoted) = criteria.subject_filter.as_deref().and_then(quote_filter) {
        parts.push(format!("SUBJECT {quoted}"));
    }
    if let Some(quoted) = criteria.from_filter.as_deref().and_then(quote_filter) {
        parts.push(format!("FROM {quoted}"));
    }

    let predicate = if parts.is_empty() {
        "ALL".to_owned()
    } else if parts.iter().any(|p| !p.is_ascii()) {
        format!("CHARSET UTF-8 {}", parts.join(" "))
    } else {
        parts.join(" ")
    };

    SearchQuery {
        predicate,
        sort: SortSpec {
            field: criteria.sort_by,
            descending: true,
        },
    }
}

/// Sanitize and quote filter text as an IMAP quoted string
///
/// Control characters (CR/LF in particular) would let a caller append new
/// commands, so they are dropped rather than escaped. Returns `None` when
/// nothing searchable remains.
fn quote_filter(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .trim()
        .chars()
        .take(MAX_FILTER_CHARS)
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Some(format!(
        "\"{}\"",
        cleaned.replace('\\', "\\\\").replace('"', "\\\"")
    ))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}
