//! Line-oriented pip requirements files.

use crate::requirement::extract;
use crate::types::{DeclarationStyle, DependencySection, OffsetBase, ParsedRequirement};
use pyreq_core::utf16_len;
use tower_lsp_server::ls_types::{Position, Range};

/// Extracts one requirement per line.
///
/// Blank lines, comments and pip options (`-r`, `--hash`, `-e`, ...) are
/// skipped. The range of a requirement is the trimmed line, and its spans
/// are relative to the start of that range.
///
/// # Examples
///
/// ```
/// use pyreq_pypi::requirements::parse_requirements;
///
/// let content = "# Comment\npackage1==1.0.0\n  package2 == 2.0.0\n-r base.txt\n";
/// let found = parse_requirements(content);
/// assert_eq!(found.len(), 2);
/// assert_eq!(found[1].range.start.character, 2);
/// assert_eq!(found[1].range.end.character, 19);
/// ```
pub fn parse_requirements(content: &str) -> Vec<ParsedRequirement> {
    let mut requirements = Vec::new();

    for (line_idx, raw_line) in content.split('\n').enumerate() {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('-') {
            continue;
        }

        let Some(spec) = extract(trimmed) else {
            continue;
        };

        let leading = &line[..line.len() - line.trim_start().len()];
        let start = utf16_len(leading);
        let end = start + utf16_len(trimmed);
        let line_idx = line_idx as u32;

        requirements.push(ParsedRequirement {
            spec,
            range: Range::new(Position::new(line_idx, start), Position::new(line_idx, end)),
            offset_base: OffsetBase::RangeStart,
            section: DependencySection::RequirementsFile,
            style: DeclarationStyle::Specifier,
        });
    }

    requirements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Operator;

    #[test]
    fn test_exact_equal_requirements_with_comment() {
        let content = "# Comment\npackage1==1.0.0\npackage2 == 2.0.0\npackage3==3.0.0";
        let found = parse_requirements(content);

        let summary: Vec<_> = found
            .iter()
            .map(|r| {
                (
                    r.identifier().to_string(),
                    r.spec.constraints[0].operator,
                    r.spec.constraints[0].version.clone(),
                    r.range,
                )
            })
            .collect();

        assert_eq!(
            summary,
            vec![
                (
                    "package1".into(),
                    Operator::Equal,
                    "1.0.0".into(),
                    Range::new(Position::new(1, 0), Position::new(1, 15))
                ),
                (
                    "package2".into(),
                    Operator::Equal,
                    "2.0.0".into(),
                    Range::new(Position::new(2, 0), Position::new(2, 17))
                ),
                (
                    "package3".into(),
                    Operator::Equal,
                    "3.0.0".into(),
                    Range::new(Position::new(3, 0), Position::new(3, 15))
                ),
            ]
        );
    }

    #[test]
    fn test_skips_options_and_blank_lines() {
        let content = "\n-r base.txt\n--hash=sha256:abc\n-e .\n   \nflask\n";
        let found = parse_requirements(content);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].identifier(), "flask");
        assert_eq!(found[0].range.start.line, 5);
    }

    #[test]
    fn test_crlf_and_trailing_comment() {
        let content = "requests>=2.0  # http\r\ndjango\r\n";
        let found = parse_requirements(content);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].range.end.character, 21);
        assert_eq!(found[1].range, Range::new(Position::new(1, 0), Position::new(1, 6)));
        assert_eq!(found[0].offset_base, OffsetBase::RangeStart);
    }

    #[test]
    fn test_unparseable_lines_are_absent() {
        let content = "./local/package\nhttps://example.com/pkg.whl\nnumpy";
        let found = parse_requirements(content);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].identifier(), "numpy");
    }
}
