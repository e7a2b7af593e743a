//! Loose extraction of a single requirement specifier.
//!
//! The grammar accepted here is deliberately more forgiving than PEP 508 so
//! that lines which are mid-edit still produce a result: whitespace anywhere
//! is ignored, a lone `=` means `==`, and an operator with no version yet is
//! dropped instead of failing the whole line. Direct references
//! (`name @ url`) fall back to a strict `pep508_rs` parse.

use crate::types::{Constraint, Operator, RequirementSource, RequirementSpec, Span};
use once_cell::sync::Lazy;
use pep508_rs::{Requirement, VersionOrUrl};
use regex::Regex;

static HEAD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9][A-Za-z0-9._-]*)(\[[^\]]*\])?").expect("valid head regex")
});

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid identifier regex"));

static CONSTRAINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(===|==|!=|~=|<=|>=|<|>|=)([A-Za-z0-9._*+!-]*)$").expect("valid constraint regex")
});

static LEADING_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z0-9][A-Za-z0-9._-]*)").expect("valid leading name regex")
});

/// Normalizes a package name for comparison.
///
/// PyPI package names are case-insensitive and treat `-`, `_`, `.` as
/// equivalent. Runs of separators collapse into a single `-`.
///
/// # Examples
///
/// ```
/// use pyreq_pypi::requirement::normalize_package_name;
///
/// assert_eq!(normalize_package_name("Foo_Bar.Baz"), "foo-bar-baz");
/// assert_eq!(normalize_package_name("zope__interface"), "zope-interface");
/// ```
pub fn normalize_package_name(name: &str) -> String {
    name.to_lowercase()
        .replace(['_', '.'], "-")
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Extracts a requirement from one line or string value.
///
/// Returns `None` when the text is not a dependency declaration. Spans in the
/// result are UTF-16 columns relative to the start of `text`.
///
/// # Examples
///
/// ```
/// use pyreq_pypi::requirement::extract;
/// use pyreq_pypi::types::Operator;
///
/// let spec = extract("bcrypt==4.0.*,>=4.0.3").unwrap();
/// assert_eq!(spec.constraints.len(), 2);
/// assert_eq!(spec.constraints[0].operator, Operator::Equal);
/// assert_eq!(spec.constraints[0].version, "4.0.*");
/// assert_eq!(spec.constraints[1].operator, Operator::GreaterEqual);
///
/// assert!(extract("# just a comment").is_none());
/// ```
pub fn extract(text: &str) -> Option<RequirementSpec> {
    let uncommented = text.find('#').map_or(text, |i| &text[..i]);
    let (body, markers) = match uncommented.split_once(';') {
        Some((body, markers)) => {
            let markers = markers.trim();
            (body, (!markers.is_empty()).then(|| markers.to_string()))
        }
        None => (uncommented, None),
    };

    match extract_loose(body) {
        Some(mut spec) => {
            spec.markers = markers;
            Some(spec)
        }
        None => extract_direct_reference(uncommented, markers),
    }
}

/// Whitespace-free copy of a string with a per-byte map back to the
/// UTF-16 columns of the original.
struct Compacted {
    text: String,
    columns: Vec<(u32, u32)>,
}

impl Compacted {
    fn new(source: &str) -> Self {
        let mut text = String::with_capacity(source.len());
        let mut columns = Vec::with_capacity(source.len());
        let mut col = 0u32;
        for ch in source.chars() {
            let width = ch.len_utf16() as u32;
            if !ch.is_whitespace() {
                text.push(ch);
                columns.extend(std::iter::repeat_n((col, col + width), ch.len_utf8()));
            }
            col += width;
        }
        Self { text, columns }
    }

    /// Source columns covered by compact bytes `[start, end)`.
    fn span(&self, start: usize, end: usize) -> Span {
        if end <= start {
            let at = self
                .columns
                .get(start)
                .map(|c| c.0)
                .or_else(|| self.columns.last().map(|c| c.1))
                .unwrap_or(0);
            return Span::empty(at);
        }
        Span::new(self.columns[start].0, self.columns[end - 1].1)
    }
}

fn extract_loose(body: &str) -> Option<RequirementSpec> {
    let compact = Compacted::new(body);
    let caps = HEAD_RE.captures(&compact.text)?;
    let name = caps.get(1)?;

    let mut extras = Vec::new();
    let mut extras_span = None;
    if let Some(group) = caps.get(2) {
        let inner = &group.as_str()[1..group.as_str().len() - 1];
        for extra in inner.split(',').filter(|e| !e.is_empty()) {
            if !IDENTIFIER_RE.is_match(extra) {
                return None;
            }
            extras.push(extra.to_string());
        }
        extras_span = Some(compact.span(group.start(), group.end()));
    }

    let head_end = caps.get(0)?.end();
    let rest = &compact.text[head_end..];
    if rest.starts_with(',') {
        return None;
    }

    let constraints = parse_constraints(&compact, head_end)?;

    Some(RequirementSpec {
        identifier: normalize_package_name(name.as_str()),
        raw_identifier: name.as_str().to_string(),
        extras,
        constraints,
        markers: None,
        source: RequirementSource::Registry,
        name_span: compact.span(name.start(), name.end()),
        extras_span,
    })
}

/// Parses the comma-separated constraint list starting at compact byte `from`.
fn parse_constraints(compact: &Compacted, from: usize) -> Option<Vec<Constraint>> {
    let mut constraints = Vec::new();
    let mut offset = from;
    for piece in compact.text[from..].split(',') {
        let start = offset;
        offset += piece.len() + 1;
        if piece.is_empty() {
            continue;
        }

        let parts = CONSTRAINT_RE.captures(piece)?;
        let op = parts.get(1)?;
        let version = parts.get(2)?;
        if version.as_str().is_empty() {
            continue;
        }

        constraints.push(Constraint {
            operator: Operator::parse(op.as_str())?,
            version: version.as_str().to_string(),
            span: compact.span(start, start + piece.len()),
            operator_span: compact.span(start + op.start(), start + op.end()),
            version_span: compact.span(start + version.start(), start + version.end()),
        });
    }
    Some(constraints)
}

/// Parses a bare specifier list such as `>=1.0, <2`.
///
/// Returns `None` unless every piece is a well-formed constraint. Spans are
/// relative to the start of `text`.
pub(crate) fn extract_constraints(text: &str) -> Option<Vec<Constraint>> {
    let compact = Compacted::new(text);
    if compact.text.starts_with(',') {
        return None;
    }
    parse_constraints(&compact, 0)
}

/// Strict PEP 508 parse for `name[extras] @ url` forms.
fn extract_direct_reference(text: &str, markers: Option<String>) -> Option<RequirementSpec> {
    let requirement: Requirement = text.trim().parse().ok()?;
    let Some(VersionOrUrl::Url(url)) = requirement.version_or_url else {
        return None;
    };

    let name = LEADING_NAME_RE.captures(text)?.get(1)?;
    let name_span = Span::new(
        utf16_col(text, name.start()),
        utf16_col(text, name.end()),
    );

    let after_name = &text[name.end()..];
    let extras_span = after_name
        .trim_start()
        .starts_with('[')
        .then(|| {
            let open = name.end() + after_name.find('[')?;
            let close = open + text[open..].find(']')?;
            Some(Span::new(utf16_col(text, open), utf16_col(text, close + 1)))
        })
        .flatten();

    Some(RequirementSpec {
        identifier: normalize_package_name(name.as_str()),
        raw_identifier: name.as_str().to_string(),
        extras: requirement.extras.iter().map(ToString::to_string).collect(),
        constraints: Vec::new(),
        markers,
        source: RequirementSource::Url {
            url: url.to_string(),
        },
        name_span,
        extras_span,
    })
}

fn utf16_col(text: &str, byte: usize) -> u32 {
    pyreq_core::utf16_len(&text[..byte])
}
