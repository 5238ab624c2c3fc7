//! Cursor-based pagination on top of GMP filter strings
//!
//! Implements the Relay Connection model for list queries. gvmd pages through
//! `first` (1-based) and `rows` in the filter string, so Relay arguments are
//! translated into those keywords and the result is turned back into edges
//! with offset cursors.
//!
//! Has-more detection uses the counts gvmd reports with every list response
//! instead of fetching an extra row.
//!
//! Usage: Use the `define_connection!` macro to create type-specific connections.

use async_graphql::SimpleObject;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use thiserror::Error;

use super::filters::FilterString;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaginationError {
    #[error("{0}")]
    Validation(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(&'static str),
}

/// Information about pagination in a connection
#[derive(SimpleObject, Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    /// When paginating forwards, are there more items?
    pub has_next_page: bool,
    /// When paginating backwards, are there more items?
    pub has_previous_page: bool,
    /// Cursor of the first item in this page
    pub start_cursor: Option<String>,
    /// Cursor of the last item in this page
    pub end_cursor: Option<String>,
}

/// Counts reported alongside a page
#[derive(SimpleObject, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityCounts {
    /// All entities of this kind visible to the user
    pub total: i64,
    /// Entities matching the filter
    pub filtered: i64,
    /// Zero-based index of the first returned entity
    pub offset: i64,
    /// Requested page size, `-1` for all
    pub limit: i64,
    /// Number of entities in this page
    pub length: i64,
}

/// The slice of the filtered result a page covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    /// Zero-based index of the first row
    pub offset: u64,
    /// Rows asked for; `None` leaves it to gvmd
    pub size: Option<u64>,
}

/// Counts and window as reported by gvmd for one list response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reported {
    pub total: Option<u64>,
    pub filtered: Option<u64>,
    pub window: Option<Window>,
}

/// An edge in a connection, containing a node and cursor (internal use)
#[derive(Debug, Clone)]
pub struct Edge<T> {
    pub node: T,
    pub cursor: String,
}

/// A paginated connection result (internal use)
#[derive(Debug, Clone)]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
    pub counts: EntityCounts,
}

/// Macro to define a GraphQL connection type for a specific node type
///
/// Usage:
/// ```ignore
/// define_connection!(EntityConnection, EntityEdge, Entity);
/// ```
#[macro_export]
macro_rules! define_connection {
    ($conn_name:ident, $edge_name:ident, $node_type:ty) => {
        /// Edge containing a node and cursor
        #[derive(async_graphql::SimpleObject, Debug, Clone)]
        pub struct $edge_name {
            /// The item at the end of the edge
            pub node: $node_type,
            /// A cursor for pagination
            pub cursor: String,
        }

        /// Connection containing edges, page info and counts
        #[derive(async_graphql::SimpleObject, Debug, Clone)]
        pub struct $conn_name {
            /// The edges in this connection
            pub edges: Vec<$edge_name>,
            /// The nodes of all edges, in order
            pub nodes: Vec<$node_type>,
            /// Pagination information
            pub page_info: $crate::graphql::pagination::PageInfo,
            /// Counts reported by gvmd
            pub counts: $crate::graphql::pagination::EntityCounts,
        }

        impl $conn_name {
            /// Create from a generic Connection
            pub fn from_connection(
                conn: $crate::graphql::pagination::Connection<$node_type>,
            ) -> Self {
                let nodes = conn.edges.iter().map(|e| e.node.clone()).collect();
                Self {
                    edges: conn
                        .edges
                        .into_iter()
                        .map(|e| $edge_name {
                            node: e.node,
                            cursor: e.cursor,
                        })
                        .collect(),
                    nodes,
                    page_info: conn.page_info,
                    counts: conn.counts,
                }
            }
        }
    };
}

impl<T> Connection<T> {
    /// Build a page from the returned nodes
    ///
    /// The offset reported by gvmd wins over the requested one, and gvmd may
    /// shrink the page below the requested size. Node `i` gets the cursor of
    /// `offset + i`.
    pub fn collect(mut nodes: Vec<T>, reported: Reported, requested: Window) -> Self {
        let window = match reported.window {
            Some(upstream) => Window {
                offset: upstream.offset,
                size: match (upstream.size, requested.size) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                },
            },
            None => requested,
        };
        if let Some(size) = window.size {
            nodes.truncate(usize::try_from(size).unwrap_or(usize::MAX));
        }

        let offset = window.offset;
        let length = nodes.len() as u64;
        let size = window.size.unwrap_or(length);
        let filtered = reported.filtered.unwrap_or(offset.saturating_add(length));
        let total = reported.total.unwrap_or(filtered);

        let edges: Vec<Edge<T>> = nodes
            .into_iter()
            .enumerate()
            .map(|(i, node)| Edge {
                cursor: encode_cursor(offset.saturating_add(i as u64)),
                node,
            })
            .collect();

        let page_info = if edges.is_empty() {
            PageInfo::default()
        } else {
            PageInfo {
                has_next_page: offset.saturating_add(size) < filtered,
                has_previous_page: offset > 0,
                start_cursor: edges.first().map(|e| e.cursor.clone()),
                end_cursor: edges.last().map(|e| e.cursor.clone()),
            }
        };

        let counts = EntityCounts {
            total: total as i64,
            filtered: filtered as i64,
            offset: offset as i64,
            limit: window.size.map_or(-1, |s| s as i64),
            length: length as i64,
        };

        Self {
            edges,
            page_info,
            counts,
        }
    }
}

/// Encode an offset as a cursor string
pub fn encode_cursor(offset: u64) -> String {
    BASE64.encode(format!("cursor:{}", offset))
}

/// Largest offset a cursor may carry; `first=offset+1` must fit in an i64
const MAX_OFFSET: u64 = i64::MAX as u64 - 1;

/// Decode a cursor string to an offset
pub fn decode_cursor(cursor: &str) -> Result<u64, PaginationError> {
    let decoded = BASE64
        .decode(cursor)
        .map_err(|_| PaginationError::InvalidCursor("invalid cursor format"))?;

    let s = String::from_utf8(decoded)
        .map_err(|_| PaginationError::InvalidCursor("invalid cursor encoding"))?;

    let Some(value) = s.strip_prefix("cursor:") else {
        return Err(PaginationError::InvalidCursor("invalid cursor prefix"));
    };

    let offset: u64 = value
        .parse()
        .map_err(|_| PaginationError::InvalidCursor("invalid cursor value"))?;
    if offset > MAX_OFFSET {
        return Err(PaginationError::InvalidCursor("cursor offset out of range"));
    }
    Ok(offset)
}

/// Relay arguments of a list query
#[derive(Debug, Clone, Default)]
pub struct PaginationArgs {
    pub first: Option<i32>,
    pub last: Option<i32>,
    pub after: Option<String>,
    pub before: Option<String>,
}

fn non_negative(name: &str, value: Option<i32>) -> Result<Option<u64>, PaginationError> {
    match value {
        Some(v) if v < 0 => Err(PaginationError::Validation(format!(
            "'{name}' must not be negative"
        ))),
        Some(v) => Ok(Some(v as u64)),
        None => Ok(None),
    }
}

/// Validated Relay arguments with decoded cursors
struct Bounds {
    first: Option<u64>,
    last: Option<u64>,
    after: Option<u64>,
    before: Option<u64>,
}

impl PaginationArgs {
    fn bounds(&self) -> Result<Bounds, PaginationError> {
        if self.first.is_some() && self.last.is_some() {
            return Err(PaginationError::Validation(
                "Cannot use both 'first' and 'last'".into(),
            ));
        }
        Ok(Bounds {
            first: non_negative("first", self.first)?,
            last: non_negative("last", self.last)?,
            after: self.after.as_deref().map(decode_cursor).transpose()?,
            before: self.before.as_deref().map(decode_cursor).transpose()?,
        })
    }
}

/// Zero-based offset and positive row limit of a base filter
fn base_window(filter: &FilterString) -> (u64, Option<u64>) {
    let offset = filter
        .first()
        .and_then(|f| u64::try_from(f.saturating_sub(1)).ok())
        .unwrap_or(0);
    let rows = filter.rows().and_then(|r| u64::try_from(r).ok()).filter(|r| *r > 0);
    (offset, rows)
}

/// Whether a `last` page can only be anchored on the filtered count
///
/// That is the case for `last` without `before` and without a `rows` limit
/// in the base filter. Fails on the same invalid arguments as
/// [`build_filter_for_pagination`], so callers can check before any lookup.
pub fn needs_filtered_count(
    base: Option<&FilterString>,
    args: &PaginationArgs,
) -> Result<bool, PaginationError> {
    let bounds = args.bounds()?;
    let base_rows = base.and_then(|b| base_window(b).1);
    Ok(bounds.last.is_some() && bounds.before.is_none() && base_rows.is_none())
}

/// Turn Relay arguments into the filter string sent to gvmd
///
/// Terms and sort order of `base` are kept; its `first`/`rows` are replaced
/// by the window the arguments select. Cursor bounds are exclusive. A `last`
/// page without any other end bound ends at `filtered`, the number of
/// entities the base filter matches.
pub fn build_filter_for_pagination(
    base: Option<FilterString>,
    args: &PaginationArgs,
    filtered: Option<u64>,
) -> Result<(FilterString, Window), PaginationError> {
    let Bounds {
        first,
        last,
        after,
        before,
    } = args.bounds()?;

    let mut filter = base.unwrap_or_default();
    let (base_offset, base_rows) = base_window(&filter);

    let mut start = match after {
        Some(a) => a
            .checked_add(1)
            .ok_or(PaginationError::InvalidCursor("cursor offset out of range"))?,
        None => base_offset,
    };

    let size = match (first, last) {
        (Some(first), _) => Some(match before {
            Some(end) => first.min(end.saturating_sub(start)),
            None => first,
        }),
        (None, Some(last)) => {
            let end = before
                .or_else(|| base_rows.map(|rows| base_offset.saturating_add(rows)))
                .or(filtered)
                .ok_or_else(|| {
                    PaginationError::Validation(
                        "'last' needs the number of matching entities".into(),
                    )
                })?;
            start = start.max(end.saturating_sub(last));
            Some(end.saturating_sub(start))
        }
        (None, None) => before.map(|end| end.saturating_sub(start)).or(base_rows),
    };

    let first_row = i64::try_from(start)
        .ok()
        .and_then(|s| s.checked_add(1))
        .ok_or(PaginationError::InvalidCursor("cursor offset out of range"))?;
    filter.set_first(Some(first_row));
    if let Some(size) = size {
        // gvmd treats rows=0 as "use the default"; the collector trims the page
        filter.set_rows(Some(i64::try_from(size.max(1)).unwrap_or(i64::MAX)));
    }

    Ok((filter, Window { offset: start, size }))
}
