//! Cursor-context resolution over raw, possibly incomplete text.
//!
//! This path does not need a parsed requirement, so it still works while the
//! user is halfway through typing an operator (`flask>|`, `flask<|=`) or
//! while a `pyproject.toml` is momentarily invalid TOML. The text before the
//! cursor is matched against a grammar that allows a trailing partial
//! operator, the text after the cursor against one that allows a leading
//! continuation, and [`combine`] merges the two operator fragments.

use crate::requirement::normalize_package_name;
use crate::types::{ContextKind, CursorContext, DocumentKind, Operator, Span};
use once_cell::sync::Lazy;
use pyreq_core::{utf16_len, utf16_to_byte_offset};
use regex::Regex;

static BEFORE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^\s*(?P<name>[A-Za-z0-9][A-Za-z0-9._-]*)\s*(?P<extras>\[[^\]]*\])?\s*",
        r"(?P<done>(?:(?:===|==|!=|~=|<=|>=|<|>|=)\s*[A-Za-z0-9._*+!-]+\s*,\s*)*)",
        r"(?:(?P<op>===|==|!=|~=|<=|>=|<|>|=|!|~)\s*(?P<ver>[A-Za-z0-9._*+!-]*))?$",
    ))
    .expect("valid partial requirement regex")
});

static AFTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<op>[<>=!~]*)\s*(?P<ver>[A-Za-z0-9._*+!-]*)").expect("valid continuation regex")
});

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([A-Za-z0-9][A-Za-z0-9._-]*)").expect("valid name regex"));

static DONE_OPERATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(===|==|!=|~=|<=|>=|<|>|=)").expect("valid operator regex"));

/// Completes an operator fragment typed before the cursor.
///
/// | typed          | completed |
/// |----------------|-----------|
/// | `=`, `==`      | `==`      |
/// | `===`          | `===`     |
/// | `!`, `!=`      | `!=`      |
/// | `~`, `~=`      | `~=`      |
/// | `<`, `<=`, `>`, `>=` | as typed |
fn complete_fragment(fragment: &str) -> Option<Operator> {
    let operator = match fragment {
        "=" | "==" => Operator::Equal,
        "===" => Operator::ArbitraryEqual,
        "!" | "!=" => Operator::NotEqual,
        "~" | "~=" => Operator::Compatible,
        "<" => Operator::Less,
        "<=" => Operator::LessEqual,
        ">" => Operator::Greater,
        ">=" => Operator::GreaterEqual,
        _ => return None,
    };
    Some(operator)
}

/// Merges the operator fragments on both sides of the cursor.
///
/// When the two halves spell a complete operator (`<` + `=`, `==` + `=`),
/// that operator wins. Otherwise the fragment before the cursor is completed
/// on its own; with nothing before the cursor the fragment after it is used,
/// and with nothing on either side the result is `==`.
pub fn combine(before: &str, after: &str) -> Operator {
    if let Some(joined) = Operator::parse(&format!("{before}{after}")) {
        return joined;
    }
    if before.is_empty() {
        return Operator::parse(after).unwrap_or(Operator::Equal);
    }
    complete_fragment(before).unwrap_or(Operator::Equal)
}

/// Resolves the completion context at `cursor` over raw requirement text.
///
/// `text` starts at line column `origin`; `cursor` is a line column. The
/// replaced span runs from the start of the operator being typed (or the
/// cursor when there is none) through whatever operator and version
/// characters follow the cursor, so the inserted text is always the full
/// operator followed by the version.
///
/// # Examples
///
/// ```
/// use pyreq_pypi::partial::resolve_partial;
/// use pyreq_pypi::types::{Operator, Span};
///
/// let ctx = resolve_partial("requests=", 0, 9).unwrap();
/// assert_eq!(ctx.operator, Operator::Equal);
/// assert_eq!(ctx.replace, Span::new(8, 9));
///
/// let ctx = resolve_partial("requests<=", 0, 9).unwrap();
/// assert_eq!(ctx.operator, Operator::LessEqual);
/// assert_eq!(ctx.replace, Span::new(8, 10));
/// ```
pub fn resolve_partial(text: &str, origin: u32, cursor: u32) -> Option<CursorContext> {
    let local = cursor.checked_sub(origin)?;
    let split = utf16_to_byte_offset(text, local)?;
    let (before, after) = text.split_at(split);

    if before.contains([';', '#']) {
        return None;
    }

    let caps = BEFORE_RE.captures(before)?;
    let typed_op = caps.name("op");
    let typed_version = caps.name("ver").map_or("", |m| m.as_str());
    let done = caps.name("done").map_or("", |m| m.as_str());

    let tail = AFTER_RE.captures(after)?;
    let after_op = tail.name("op").map_or("", |m| m.as_str());
    let after_len = tail.get(0).map_or(0, |m| m.end());

    if typed_op.is_none() && after.starts_with(|c: char| c.is_ascii_alphanumeric() || "._-".contains(c)) {
        // cursor is inside the name
        return None;
    }

    let operator = match typed_op {
        Some(op) if !typed_version.is_empty() => complete_fragment(op.as_str())?,
        Some(op) => combine(op.as_str(), after_op),
        None if after_op.is_empty() && !done.is_empty() => {
            let first = DONE_OPERATOR_RE.captures(done.trim_start())?.get(1)?;
            Operator::parse(first.as_str())?.complement()
        }
        None => combine("", after_op),
    };

    let start = typed_op.map_or(cursor, |op| origin + utf16_len(&before[..op.start()]));
    let end = cursor + utf16_len(&after[..after_len]);

    Some(CursorContext {
        operator,
        replace: Span::new(start, end),
        kind: ContextKind::PartialOperator,
    })
}

/// Locates the quoted TOML string that contains `cursor`.
///
/// Returns the line column where the string's content starts and the content
/// itself. Basic strings honour backslash escapes; a string left open runs
/// to the end of the line.
pub fn quoted_string_at(line: &str, cursor: u32) -> Option<(u32, &str)> {
    let mut chars = line.char_indices();
    let mut col = 0u32;

    while let Some((i, ch)) = chars.next() {
        let width = ch.len_utf16() as u32;
        if ch == '#' {
            return None;
        }
        if ch != '"' && ch != '\'' {
            col += width;
            continue;
        }

        let content_start = i + 1;
        let content_col = col + 1;
        let mut end = line.len();
        let mut escaped = false;
        col += 1;
        for (j, c) in chars.by_ref() {
            col += c.len_utf16() as u32;
            if escaped {
                escaped = false;
            } else if c == '\\' && ch == '"' {
                escaped = true;
            } else if c == ch {
                end = j;
                break;
            }
        }

        let content = &line[content_start..end];
        let content_end_col = content_col + utf16_len(content);
        if content_col <= cursor && cursor <= content_end_col {
            return Some((content_col, content));
        }
        if end == line.len() {
            return None;
        }
    }
    None
}

/// Partial resolution on a whole line of a document.
///
/// Requirements lines are resolved directly; in `pyproject.toml` the quoted
/// string under the cursor is the requirement text.
///
/// # Examples
///
/// ```
/// use pyreq_pypi::partial::resolve_partial_in_line;
/// use pyreq_pypi::types::{DocumentKind, Operator};
///
/// let line = r#"dependencies = ["flask>", "django"]"#;
/// let ctx = resolve_partial_in_line(line, 23, DocumentKind::Pyproject).unwrap();
/// assert_eq!(ctx.operator, Operator::Greater);
/// ```
pub fn resolve_partial_in_line(line: &str, cursor: u32, kind: DocumentKind) -> Option<CursorContext> {
    match kind {
        DocumentKind::Requirements => {
            let trimmed = line.trim_start();
            if trimmed.starts_with('#') || trimmed.starts_with('-') {
                return None;
            }
            let origin = utf16_len(&line[..line.len() - trimmed.len()]);
            resolve_partial(trimmed, origin, cursor)
        }
        DocumentKind::Pyproject => {
            let (origin, content) = quoted_string_at(line, cursor)?;
            resolve_partial(content, origin, cursor)
        }
    }
}

/// Normalized name of the requirement being typed at `cursor`.
///
/// Reads the same text [`resolve_partial_in_line`] resolves over.
pub fn package_name_in_line(line: &str, cursor: u32, kind: DocumentKind) -> Option<String> {
    let text = match kind {
        DocumentKind::Requirements => line,
        DocumentKind::Pyproject => quoted_string_at(line, cursor)?.1,
    };
    let name = NAME_RE.captures(text)?.get(1)?;
    Some(normalize_package_name(name.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(text: &str, cursor: u32) -> Option<(Operator, Span)> {
        resolve_partial(text, 0, cursor).map(|c| (c.operator, c.replace))
    }

    #[test]
    fn test_package_name_in_line() {
        assert_eq!(
            package_name_in_line("  Django_REST>", 14, DocumentKind::Requirements).as_deref(),
            Some("django-rest")
        );
        assert_eq!(
            package_name_in_line(r#"deps = ["a", "Flask<"]"#, 20, DocumentKind::Pyproject).as_deref(),
            Some("flask")
        );
        assert_eq!(package_name_in_line("deps = [", 8, DocumentKind::Pyproject), None);
        assert_eq!(package_name_in_line(">=1", 3, DocumentKind::Requirements), None);
    }

    #[test]
    fn test_combination_table() {
        let cases = [
            ("", "", Operator::Equal),
            ("", "=", Operator::Equal),
            ("", ">=", Operator::GreaterEqual),
            ("=", "", Operator::Equal),
            ("=", "=", Operator::Equal),
            ("=", "==", Operator::ArbitraryEqual),
            ("==", "", Operator::Equal),
            ("==", "=", Operator::ArbitraryEqual),
            ("===", "", Operator::ArbitraryEqual),
            ("!", "", Operator::NotEqual),
            ("!", "=", Operator::NotEqual),
            ("~", "", Operator::Compatible),
            ("~", "=", Operator::Compatible),
            ("<", "", Operator::Less),
            ("<", "=", Operator::LessEqual),
            (">", "", Operator::Greater),
            (">", "=", Operator::GreaterEqual),
            (">", ">", Operator::Greater),
            ("<=", "", Operator::LessEqual),
            (">=", "", Operator::GreaterEqual),
        ];
        for (before, after, expected) in cases {
            assert_eq!(combine(before, after), expected, "{before:?} | {after:?}");
        }
    }

    #[test]
    fn test_lone_equals_upgraded() {
        assert_eq!(
            ctx("requests=", 9),
            Some((Operator::Equal, Span::new(8, 9)))
        );
        assert_eq!(
            ctx("requests=2.28.0", 9),
            Some((Operator::Equal, Span::new(8, 15)))
        );
    }

    #[test]
    fn test_cursor_splits_two_char_operator() {
        assert_eq!(
            ctx("requests>=2.28.0", 9),
            Some((Operator::GreaterEqual, Span::new(8, 16)))
        );
        assert_eq!(ctx("requests<=", 9), Some((Operator::LessEqual, Span::new(8, 10))));
        assert_eq!(ctx("requests!=", 9), Some((Operator::NotEqual, Span::new(8, 10))));
        assert_eq!(ctx("requests~=", 9), Some((Operator::Compatible, Span::new(8, 10))));
        assert_eq!(ctx("requests==", 9), Some((Operator::Equal, Span::new(8, 10))));
    }

    #[test]
    fn test_cursor_inside_arbitrary_equality() {
        for cursor in [9, 10, 11] {
            assert_eq!(
                ctx("requests===1.0", cursor),
                Some((Operator::ArbitraryEqual, Span::new(8, 14))),
                "cursor {cursor}"
            );
        }
    }

    #[test]
    fn test_single_char_fragments() {
        assert_eq!(ctx("flask>", 6), Some((Operator::Greater, Span::new(5, 6))));
        assert_eq!(ctx("flask <", 7), Some((Operator::Less, Span::new(6, 7))));
        assert_eq!(ctx("flask!", 6), Some((Operator::NotEqual, Span::new(5, 6))));
        assert_eq!(ctx("flask~", 6), Some((Operator::Compatible, Span::new(5, 6))));
    }

    #[test]
    fn test_cursor_in_version() {
        assert_eq!(
            ctx("flask>=1.0.2", 10),
            Some((Operator::GreaterEqual, Span::new(5, 12)))
        );
        assert_eq!(ctx("flask>= 1", 9), Some((Operator::GreaterEqual, Span::new(5, 9))));
    }

    #[test]
    fn test_no_operator_yet() {
        assert_eq!(ctx("flask", 5), Some((Operator::Equal, Span::empty(5))));
        assert_eq!(ctx("flask[async] ", 13), Some((Operator::Equal, Span::empty(13))));
        assert_eq!(
            ctx("flask>=2", 5),
            Some((Operator::GreaterEqual, Span::new(5, 8)))
        );
    }

    #[test]
    fn test_trailing_comma_complement() {
        assert_eq!(ctx("foobar>=0.1, ", 13), Some((Operator::Less, Span::empty(13))));
        assert_eq!(ctx("foobar>0.1,", 11), Some((Operator::LessEqual, Span::empty(11))));
        assert_eq!(ctx("foobar>=0.1,<", 13), Some((Operator::Less, Span::new(12, 13))));
    }

    #[test]
    fn test_rejections() {
        assert_eq!(ctx("requests", 4), None);
        assert_eq!(ctx("flask[as", 8), None);
        assert_eq!(ctx("django>2.1; os_name", 15), None);
        assert_eq!(ctx("django>2.1 # x", 13), None);
        assert_eq!(ctx("./local", 3), None);
        assert_eq!(ctx("flask>>", 7), None);
        assert_eq!(resolve_partial("flask", 4, 2), None);
    }

    #[test]
    fn test_origin_offsets() {
        let c = resolve_partial("flask<", 10, 16).unwrap();
        assert_eq!(c.operator, Operator::Less);
        assert_eq!(c.replace, Span::new(15, 16));
        assert_eq!(c.kind, ContextKind::PartialOperator);
    }

    #[test]
    fn test_quoted_string_at() {
        let line = r#"deps = ["a>1", 'b<2', "c"]"#;
        assert_eq!(quoted_string_at(line, 10), Some((9, "a>1")));
        assert_eq!(quoted_string_at(line, 12), Some((9, "a>1")));
        assert_eq!(quoted_string_at(line, 17), Some((16, "b<2")));
        assert_eq!(quoted_string_at(line, 14), None);
        assert_eq!(quoted_string_at(line, 2), None);

        let escaped = r#"x = "a\"b", "c""#;
        assert_eq!(quoted_string_at(escaped, 13), Some((13, "c")));

        let open = r#"dependencies = ["flask>="#;
        assert_eq!(quoted_string_at(open, 24), Some((17, "flask>=")));

        assert_eq!(quoted_string_at(r##"# "x""##, 3), None);
    }

    #[test]
    fn test_resolve_partial_in_requirements_line() {
        let c = resolve_partial_in_line("  flask=", 8, DocumentKind::Requirements).unwrap();
        assert_eq!(c.operator, Operator::Equal);
        assert_eq!(c.replace, Span::new(7, 8));

        assert!(resolve_partial_in_line("# flask=", 8, DocumentKind::Requirements).is_none());
        assert!(resolve_partial_in_line("-r a.txt", 8, DocumentKind::Requirements).is_none());
    }

    #[test]
    fn test_resolve_partial_in_pyproject_line() {
        let line = r#"  "gidgethub[httpx]<","#;
        let c = resolve_partial_in_line(line, 20, DocumentKind::Pyproject).unwrap();
        assert_eq!(c.operator, Operator::Less);
        assert_eq!(c.replace, Span::new(19, 20));

        assert!(resolve_partial_in_line(line, 1, DocumentKind::Pyproject).is_none());
    }
}
