//! GMP filter strings
//!
//! A filter string is a whitespace separated list of terms such as
//!
//! ```text
//! name~"web server" severity>5.0 sort-reverse=severity first=11 rows=10
//! ```
//!
//! Terms are passed to gvmd untouched; only the paging and sorting keywords
//! (`first`, `rows`, `sort`, `sort-reverse`) are understood here so that the
//! pagination layer can rewrite them.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const KEYWORDS: [&str; 4] = ["first", "rows", "sort", "sort-reverse"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Unmatched quote at position {position}")]
    UnmatchedQuote { position: usize },
    #[error("Unknown operator '{operator}' in '{token}'")]
    UnknownOperator { operator: String, token: String },
    #[error("Invalid value '{value}' for keyword '{keyword}'")]
    InvalidKeyword { keyword: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// `=`
    Equal,
    /// `~`
    Contains,
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `:`
    Regex,
}

impl Relation {
    const CHARS: [char; 5] = ['=', '~', '<', '>', ':'];

    fn from_operator(op: &str) -> Option<Self> {
        match op {
            "=" => Some(Relation::Equal),
            "~" => Some(Relation::Contains),
            "<" => Some(Relation::Less),
            ">" => Some(Relation::Greater),
            ":" => Some(Relation::Regex),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Equal => "=",
            Relation::Contains => "~",
            Relation::Less => "<",
            Relation::Greater => ">",
            Relation::Regex => ":",
        }
    }
}

/// One filter term, e.g. `name~"foo bar"` or a bare search word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub column: Option<String>,
    pub relation: Option<Relation>,
    pub value: String,
    pub quoted: bool,
}

impl Term {
    pub fn new(column: impl Into<String>, relation: Relation, value: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            relation: Some(relation),
            value: value.into(),
            quoted: false,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(column) = &self.column {
            f.write_str(column)?;
        }
        if let Some(relation) = self.relation {
            f.write_str(relation.as_str())?;
        }
        write_value(f, &self.value, self.quoted)
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &str, quoted: bool) -> fmt::Result {
    let needs_quotes = quoted || (value.contains(char::is_whitespace) && !value.contains('"'));
    if needs_quotes {
        write!(f, "\"{value}\"")
    } else {
        f.write_str(value)
    }
}

/// `sort=field` or `sort-reverse=field`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
    pub quoted: bool,
}

impl Sort {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
            quoted: false,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            descending: true,
            ..Self::ascending(field)
        }
    }

    fn keyword(&self) -> &'static str {
        if self.descending { "sort-reverse" } else { "sort" }
    }
}

/// A parsed filter string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterString {
    terms: Vec<Term>,
    sort: Option<Sort>,
    first: Option<i64>,
    rows: Option<i64>,
}

impl FilterString {
    pub fn parse(raw: &str) -> Result<Self, FilterError> {
        let mut filter = FilterString::default();

        for token in tokenize(raw)? {
            let term = parse_term(token)?;

            let keyword = match (&term.column, term.relation) {
                (Some(column), Some(Relation::Equal)) if KEYWORDS.contains(&column.as_str()) => {
                    column.clone()
                }
                _ => {
                    filter.terms.push(term);
                    continue;
                }
            };

            match keyword.as_str() {
                "first" => filter.first = Some(keyword_int(&keyword, &term.value, 1)?),
                "rows" => filter.rows = Some(keyword_int(&keyword, &term.value, -1)?),
                _ if term.value.is_empty() => {
                    return Err(FilterError::InvalidKeyword {
                        keyword: keyword.clone(),
                        value: term.value,
                    });
                }
                _ => {
                    filter.sort = Some(Sort {
                        field: term.value,
                        descending: keyword == "sort-reverse",
                        quoted: term.quoted,
                    })
                }
            }
        }

        Ok(filter)
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn push(&mut self, term: Term) {
        self.terms.push(term);
    }

    pub fn sort(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }

    /// 1-based index of the first row
    pub fn first(&self) -> Option<i64> {
        self.first
    }

    pub fn set_first(&mut self, first: Option<i64>) {
        self.first = first;
    }

    /// Page size, `-1` for all rows
    pub fn rows(&self) -> Option<i64> {
        self.rows
    }

    pub fn set_rows(&mut self, rows: Option<i64>) {
        self.rows = rows;
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.sort.is_none() && self.first.is_none() && self.rows.is_none()
    }
}

impl fmt::Display for FilterString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for term in &self.terms {
            write!(f, "{sep}{term}")?;
            sep = " ";
        }
        if let Some(sort) = &self.sort {
            write!(f, "{sep}{}=", sort.keyword())?;
            write_value(f, &sort.field, sort.quoted)?;
            sep = " ";
        }
        if let Some(first) = self.first {
            write!(f, "{sep}first={first}")?;
            sep = " ";
        }
        if let Some(rows) = self.rows {
            write!(f, "{sep}rows={rows}")?;
        }
        Ok(())
    }
}

impl FromStr for FilterString {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Split on whitespace outside double quotes
fn tokenize(raw: &str) -> Result<Vec<&str>, FilterError> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    let mut open_quote: Option<usize> = None;

    for (i, c) in raw.char_indices() {
        if c == '"' {
            open_quote = match open_quote {
                Some(_) => None,
                None => Some(i),
            };
        }
        if c.is_whitespace() && open_quote.is_none() {
            if let Some(s) = start.take() {
                tokens.push(&raw[s..i]);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }

    if let Some(position) = open_quote {
        return Err(FilterError::UnmatchedQuote { position });
    }
    if let Some(s) = start {
        tokens.push(&raw[s..]);
    }
    Ok(tokens)
}

fn parse_term(token: &str) -> Result<Term, FilterError> {
    let mut in_quotes = false;
    let mut operator: Option<(usize, usize)> = None;

    for (i, c) in token.char_indices() {
        if c == '"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes || !Relation::CHARS.contains(&c) {
            continue;
        }
        let end = token[i..]
            .find(|c: char| !Relation::CHARS.contains(&c))
            .map_or(token.len(), |n| i + n);
        operator = Some((i, end));
        break;
    }

    let Some((start, end)) = operator else {
        let (value, quoted) = unquote(token);
        return Ok(Term {
            column: None,
            relation: None,
            value: value.to_string(),
            quoted,
        });
    };

    let op = &token[start..end];
    let relation = Relation::from_operator(op).ok_or_else(|| FilterError::UnknownOperator {
        operator: op.to_string(),
        token: token.to_string(),
    })?;
    let column = &token[..start];
    let (value, quoted) = unquote(&token[end..]);

    Ok(Term {
        column: (!column.is_empty()).then(|| column.to_string()),
        relation: Some(relation),
        value: value.to_string(),
        quoted,
    })
}

fn unquote(value: &str) -> (&str, bool) {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => (inner, true),
        None => (value, false),
    }
}

fn keyword_int(keyword: &str, value: &str, min: i64) -> Result<i64, FilterError> {
    value
        .parse::<i64>()
        .ok()
        .filter(|n| *n >= min)
        .ok_or_else(|| FilterError::InvalidKeyword {
            keyword: keyword.to_string(),
            value: value.to_string(),
        })
}
