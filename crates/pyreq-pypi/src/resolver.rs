//! Cursor-context resolution over an already parsed requirement.
//!
//! Given a requirement, the text of the line the cursor is on, and the cursor
//! column, decide which operator a version completion should start with and
//! which columns it overwrites. All arithmetic happens in line columns
//! (UTF-16); [`OffsetBase`] tells how the requirement's spans map onto them.

use crate::types::{
    AssignedValue, ContextKind, CursorContext, OffsetBase, Operator, ParsedRequirement,
    RequirementSpec, Span, ValueContext,
};
use pyreq_core::{clamp_utf16_to_byte_offset, utf16_len};
use tower_lsp_server::ls_types::Range;

/// Resolves the completion context of a scanned requirement.
///
/// `line` is the full text of line `cursor_line`, and `cursor` is a column
/// on it.
pub fn resolve_requirement(
    requirement: &ParsedRequirement,
    cursor_line: u32,
    cursor: u32,
    line: &str,
) -> Option<CursorContext> {
    if requirement.range.start.line != cursor_line {
        return None;
    }
    resolve(
        &requirement.spec,
        requirement.range,
        requirement.offset_base,
        cursor,
        line,
    )
}

/// Resolves the completion context at `cursor` (a line column).
///
/// Rules, first match wins:
///
/// 1. at or past a `;` marker or `#` comment: nothing;
/// 2. on a constraint (end inclusive): its operator, replacing the whole
///    constraint;
/// 3. past a constraint with only whitespace in between: its operator,
///    replacing from the constraint start to the cursor;
/// 4. past `,` after the last constraint: the complement of the first
///    operator, inserted at the cursor;
/// 5. after the name and extras, before any constraint: `==`, replacing the
///    whitespace run before the cursor;
/// 6. otherwise (inside the name or extras): nothing.
///
/// # Examples
///
/// ```
/// use pyreq_pypi::requirement::extract;
/// use pyreq_pypi::resolver::resolve;
/// use pyreq_pypi::types::{OffsetBase, Operator, Span};
/// use tower_lsp_server::ls_types::{Position, Range};
///
/// let line = "requests>=2.28.0";
/// let spec = extract(line).unwrap();
/// let range = Range::new(Position::new(0, 0), Position::new(0, 16));
///
/// // between `>` and `=`
/// let ctx = resolve(&spec, range, OffsetBase::RangeStart, 9, line).unwrap();
/// assert_eq!(ctx.operator, Operator::GreaterEqual);
/// assert_eq!(ctx.replace, Span::new(8, 16));
/// ```
pub fn resolve(
    spec: &RequirementSpec,
    range: Range,
    base: OffsetBase,
    cursor: u32,
    line: &str,
) -> Option<CursorContext> {
    let origin = match base {
        OffsetBase::RangeStart => range.start.character,
        OffsetBase::LineStart => 0,
    };
    let window_end = if range.end.line == range.start.line {
        range.end.character
    } else {
        utf16_len(line)
    };

    if let Some(boundary) = marker_boundary(line, range.start.character, window_end)
        && cursor >= boundary
    {
        return None;
    }
    // past the requirement, only whitespace may separate it from the cursor
    if cursor > window_end && !columns(line, window_end, cursor).trim().is_empty() {
        return None;
    }

    let constraints: Vec<_> = spec
        .constraints
        .iter()
        .map(|c| (c.operator, c.span.shift(origin)))
        .collect();

    if let Some(&(operator, span)) = constraints.iter().find(|(_, span)| span.touches(cursor)) {
        return Some(CursorContext {
            operator,
            replace: span,
            kind: ContextKind::InsideConstraint,
        });
    }

    if let Some(&(operator, span)) = constraints
        .iter()
        .find(|(_, span)| span.end < cursor && columns(line, span.end, cursor).trim().is_empty())
    {
        return Some(CursorContext {
            operator,
            replace: Span::new(span.start, cursor),
            kind: ContextKind::AfterConstraint,
        });
    }

    if let (Some(&(first, _)), Some(&(_, last))) = (constraints.first(), constraints.last())
        && last.end < cursor
        && is_trailing_comma(columns(line, last.end, cursor))
    {
        return Some(CursorContext {
            operator: first.complement(),
            replace: Span::empty(cursor),
            kind: ContextKind::RangeContinuation,
        });
    }

    let head_end = origin + spec.head_end();
    let before_first = constraints.first().is_none_or(|(_, span)| cursor <= span.start);
    if cursor >= head_end && before_first {
        let gap = columns(line, head_end, cursor);
        let trailing_ws = utf16_len(gap) - utf16_len(gap.trim_end());
        return Some(CursorContext {
            operator: Operator::Equal,
            replace: Span::new(cursor - trailing_ws, cursor),
            kind: ContextKind::AfterName,
        });
    }

    None
}

/// Resolves the completion context inside a TOML assignment value such as
/// `requests = "^2.22.0"` or `flask = ">=3.0, <4"`.
///
/// The comma-separated piece under the cursor is replaced as a whole and its
/// leading operator characters, Poetry `^` and `~` included, become the
/// prefix of the inserted text. An empty piece after a comma starts a new
/// bound with the complement of the first piece's operator.
///
/// # Examples
///
/// ```
/// use pyreq_pypi::resolver::resolve_assignment;
/// use pyreq_pypi::types::{AssignedValue, Span};
///
/// // requests = "^2.22.0"
/// let value = AssignedValue { text: "^2.22.0".into(), line: 8, span: Span::new(12, 19) };
/// let ctx = resolve_assignment(&value, 15).unwrap();
/// assert_eq!(ctx.prefix, "^");
/// assert_eq!(ctx.replace, Span::new(12, 19));
/// ```
pub fn resolve_assignment(value: &AssignedValue, cursor: u32) -> Option<ValueContext> {
    if !value.span.touches(cursor) {
        return None;
    }
    let text = value.text.as_str();
    let cursor_byte = clamp_utf16_to_byte_offset(text, cursor - value.span.start);
    let col = |byte: usize| value.span.start + utf16_len(&text[..byte]);

    let mut pieces = Vec::new();
    let mut offset = 0;
    for piece in text.split(',') {
        pieces.push((offset, piece));
        offset += piece.len() + 1;
    }

    let &(piece_start, piece) = pieces
        .iter()
        .find(|(start, piece)| cursor_byte <= start + piece.len())?;

    let trimmed = piece.trim();
    if trimmed.is_empty() {
        let first_operator = pieces
            .first()
            .and_then(|(_, first)| Operator::parse(operator_prefix(first.trim())))
            .unwrap_or(Operator::Equal);
        let operator = if piece_start == 0 {
            Operator::Equal
        } else {
            first_operator.complement()
        };
        return Some(ValueContext {
            prefix: operator.as_str().to_string(),
            replace: Span::empty(cursor),
        });
    }

    let leading = piece.len() - piece.trim_start().len();
    let start = piece_start + leading;
    let prefix = match operator_prefix(trimmed) {
        "=" => "==",
        other => other,
    };

    Some(ValueContext {
        prefix: prefix.to_string(),
        replace: Span::new(col(start), col(start + trimmed.len())),
    })
}

/// Leading operator characters of a value piece, Poetry `^` and `~` included.
fn operator_prefix(piece: &str) -> &str {
    let end = piece
        .find(|c: char| !matches!(c, '^' | '~' | '<' | '>' | '=' | '!'))
        .unwrap_or(piece.len());
    &piece[..end]
}

/// Column of the first `;` or `#` in `[from, to)`.
pub(crate) fn marker_boundary(line: &str, from: u32, to: u32) -> Option<u32> {
    let window = columns(line, from, to);
    let index = window.find([';', '#'])?;
    Some(from + utf16_len(&window[..index]))
}

/// Text between two line columns.
pub(crate) fn columns(line: &str, from: u32, to: u32) -> &str {
    let start = clamp_utf16_to_byte_offset(line, from);
    let end = clamp_utf16_to_byte_offset(line, to).max(start);
    &line[start..end]
}

/// `true` for text made of one comma with optional surrounding whitespace.
fn is_trailing_comma(text: &str) -> bool {
    text.trim() == ","
}
