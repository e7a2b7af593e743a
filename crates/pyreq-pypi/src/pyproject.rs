//! Dependency locations inside `pyproject.toml`.
//!
//! The document is parsed with `toml_edit` so every key and value keeps its
//! byte span. A recursive visitor walks the tree carrying the path of keys
//! and array indices that led to each node, and [`classify`] maps a path to
//! the dependency section it denotes, if any.
//!
//! Two declaration shapes exist:
//!
//! - arrays of PEP 508 strings (`project.dependencies`, dependency groups,
//!   `build-system.requires`, uv arrays), whose elements go through the
//!   extractor;
//! - assignment tables (Poetry, pixi) where the key is the package name and
//!   the value carries the version.

use crate::error::{PypiError, Result};
use crate::requirement::{extract, extract_constraints, normalize_package_name};
use crate::types::{
    AssignedValue, Constraint, DeclarationStyle, DependencySection, OffsetBase, Operator,
    ParsedRequirement, RequirementSource, RequirementSpec, Span,
};
use pep440_rs::Version;
use pyreq_core::LineOffsetTable;
use std::str::FromStr;
use toml_edit::{Array, Document, InlineTable, Item, Key, Table, Value};

/// One step of the path from the document root to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    /// The node is an array of requirement strings
    Array(DependencySection),
    /// The node's key is a package name
    Assignment(DependencySection),
}

/// Maps a key path to the dependency location it denotes.
fn classify(path: &[Segment<'_>]) -> Option<Location> {
    use DependencySection as S;
    use Location::{Array, Assignment};
    use Segment::Key;

    let location = match path {
        [Key("project"), Key("dependencies")] => Array(S::Project),
        [Key("project"), Key("optional-dependencies"), Key(extra)] => {
            Array(S::OptionalDependencies {
                extra: (*extra).to_string(),
            })
        }
        [Key("dependency-groups"), Key(group)] => Array(S::DependencyGroup {
            group: (*group).to_string(),
        }),
        [Key("build-system"), Key("requires")] => Array(S::BuildSystem),
        [Key("tool"), Key("uv"), Key("dev-dependencies")] => Array(S::UvDev),
        [Key("tool"), Key("uv"), Key("constraint-dependencies")] => Array(S::UvConstraint),
        [Key("tool"), Key("uv"), Key("override-dependencies")] => Array(S::UvOverride),
        [Key("tool"), Key("poetry"), Key("dependencies"), Key(_)] => Assignment(S::Poetry),
        [Key("tool"), Key("poetry"), Key("dev-dependencies"), Key(_)] => Assignment(S::PoetryDev),
        [
            Key("tool"),
            Key("poetry"),
            Key("group"),
            Key(group),
            Key("dependencies"),
            Key(_),
        ] => Assignment(S::PoetryGroup {
            group: (*group).to_string(),
        }),
        [Key("tool"), Key("pixi"), Key("pypi-dependencies"), Key(_)] => Assignment(S::Pixi),
        [
            Key("tool"),
            Key("pixi"),
            Key("feature"),
            Key(feature),
            Key("pypi-dependencies"),
            Key(_),
        ] => Assignment(S::PixiFeature {
            feature: (*feature).to_string(),
        }),
        _ => return None,
    };
    Some(location)
}

/// Renders a path the way TOML addresses it, e.g. `tool.poetry.group[0]`.
fn dotted(path: &[Segment<'_>]) -> String {
    let mut out = String::new();
    for segment in path {
        match segment {
            Segment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            Segment::Index(i) => out.push_str(&format!("[{i}]")),
        }
    }
    out
}

/// Parses `pyproject.toml` content and returns every requirement in it.
///
/// Requirements come out in visiting order; callers that need document
/// order sort by range.
///
/// # Errors
///
/// Returns [`PypiError::TomlParseError`] when the document is not valid TOML.
///
/// # Examples
///
/// ```
/// use pyreq_pypi::pyproject::parse_pyproject;
///
/// let content = "[project]\ndependencies = [\"httpx\", \"django>2.1\"]\n";
/// let found = parse_pyproject(content).unwrap();
/// assert_eq!(found.len(), 2);
/// assert_eq!(found[1].spec.identifier, "django");
///
/// assert!(parse_pyproject("[project\n").is_err());
/// ```
pub fn parse_pyproject(content: &str) -> Result<Vec<ParsedRequirement>> {
    let doc: Document<&str> =
        Document::parse(content).map_err(|e| PypiError::TomlParseError { source: e })?;

    let mut visitor = Visitor {
        content,
        lines: LineOffsetTable::new(content),
        found: Vec::new(),
    };
    visitor.visit_table(doc.as_table(), Vec::new());

    Ok(visitor.found)
}

/// A node that can stand for a package in an assignment table.
#[derive(Clone, Copy)]
enum Entry<'a> {
    Value(&'a Value),
    Table(&'a Table),
}

struct Visitor<'a> {
    content: &'a str,
    lines: LineOffsetTable,
    found: Vec<ParsedRequirement>,
}

impl<'a> Visitor<'a> {
    fn visit_table(&mut self, table: &'a Table, path: Vec<Segment<'a>>) {
        for (key, item) in table.iter() {
            let mut child = path.clone();
            child.push(Segment::Key(key));
            self.visit_item(item, table.key(key), child);
        }
    }

    fn visit_inline_table(&mut self, table: &'a InlineTable, path: Vec<Segment<'a>>) {
        for (key, value) in table.iter() {
            let mut child = path.clone();
            child.push(Segment::Key(key));
            self.visit_node(Entry::Value(value), table.key(key), child);
        }
    }

    fn visit_item(&mut self, item: &'a Item, key: Option<&'a Key>, path: Vec<Segment<'a>>) {
        match item {
            Item::Value(value) => self.visit_node(Entry::Value(value), key, path),
            Item::Table(table) => self.visit_node(Entry::Table(table), key, path),
            Item::ArrayOfTables(tables) => {
                for (i, table) in tables.iter().enumerate() {
                    let mut child = path.clone();
                    child.push(Segment::Index(i));
                    self.visit_table(table, child);
                }
            }
            Item::None => {}
        }
    }

    fn visit_node(&mut self, entry: Entry<'a>, key: Option<&'a Key>, path: Vec<Segment<'a>>) {
        let location = classify(&path);
        if location.is_some() {
            tracing::trace!(path = %dotted(&path), "dependency location");
        }

        match location {
            Some(Location::Array(section)) => {
                if let Entry::Value(Value::Array(array)) = entry {
                    self.register_array(array, &section);
                }
                return;
            }
            Some(Location::Assignment(section)) => {
                if let Some(Segment::Key(name)) = path.last() {
                    self.register_assignment(name, entry, key, section);
                }
                return;
            }
            None => {}
        }

        match entry {
            Entry::Table(table) => self.visit_table(table, path),
            Entry::Value(Value::InlineTable(table)) => self.visit_inline_table(table, path),
            Entry::Value(Value::Array(array)) => {
                for (i, value) in array.iter().enumerate() {
                    if let Value::InlineTable(table) = value {
                        let mut child = path.clone();
                        child.push(Segment::Index(i));
                        self.visit_inline_table(table, child);
                    }
                }
            }
            Entry::Value(_) => {}
        }
    }

    fn register_array(&mut self, array: &Array, section: &DependencySection) {
        for value in array.iter() {
            // Only non-empty strings are specifiers; PEP 735 `{include-group = ...}` is skipped
            let Some(text) = value.as_str().filter(|s| !s.is_empty()) else {
                continue;
            };
            let Some((content_start, content_end)) = self.string_content(value) else {
                continue;
            };
            let Some(spec) = extract(text) else {
                continue;
            };

            let range = self.lines.range_of(self.content, content_start, content_end);
            self.found.push(ParsedRequirement {
                spec: spec.shifted(range.start.character),
                range,
                offset_base: OffsetBase::LineStart,
                section: section.clone(),
                style: DeclarationStyle::Specifier,
            });
        }
    }

    fn register_assignment(
        &mut self,
        name: &str,
        entry: Entry<'_>,
        key: Option<&Key>,
        section: DependencySection,
    ) {
        let (node_start, node_end) = match entry {
            Entry::Value(value) => match value.span() {
                Some(span) => (span.start, span.end),
                None => return,
            },
            Entry::Table(table) => match expanded_table_extent(table) {
                Some(extent) => extent,
                None => return,
            },
        };

        let key_span = key.and_then(Key::span);
        let start = match entry {
            Entry::Table(_) => node_start,
            Entry::Value(_) => key_span.as_ref().map_or(node_start, |s| s.start),
        };
        let range = self.lines.range_of(self.content, start, node_end);

        let name_span = match &key_span {
            Some(span) => {
                let key_range = self.lines.range_of(self.content, span.start, span.end);
                Span::new(key_range.start.character, key_range.end.character)
            }
            None => Span::new(
                range.start.character,
                range.start.character + pyreq_core::utf16_len(name),
            ),
        };

        let value = self.assigned_value(entry);
        let constraints = value
            .as_ref()
            .map(synthetic_constraints)
            .unwrap_or_default();

        self.found.push(ParsedRequirement {
            spec: RequirementSpec {
                identifier: normalize_package_name(name),
                raw_identifier: name.to_string(),
                extras: Vec::new(),
                constraints,
                markers: None,
                source: RequirementSource::Registry,
                name_span,
                extras_span: None,
            },
            range,
            offset_base: OffsetBase::LineStart,
            section,
            style: DeclarationStyle::Assignment { value },
        });
    }

    /// The version string of an assignment: the value itself, or its
    /// `version` key for inline and expanded tables.
    fn assigned_value(&self, entry: Entry<'_>) -> Option<AssignedValue> {
        let value = match entry {
            Entry::Value(Value::InlineTable(table)) => table.get("version")?,
            Entry::Value(value) => value,
            Entry::Table(table) => table.get("version")?.as_value()?,
        };
        let text = value.as_str()?;
        let (start, end) = self.string_content(value)?;
        let range = self.lines.range_of(self.content, start, end);

        Some(AssignedValue {
            text: text.to_string(),
            line: range.start.line,
            span: Span::new(range.start.character, range.end.character),
        })
    }

    /// Byte bounds of a string value's content, without quotes.
    fn string_content(&self, value: &Value) -> Option<(usize, usize)> {
        let span = value.span()?;
        let raw = self.content.get(span.clone())?;
        let width = if raw.starts_with("\"\"\"") || raw.starts_with("'''") {
            3
        } else {
            1
        };
        if raw.len() < width * 2 {
            return None;
        }

        let mut start = span.start + width;
        // a newline right after a multi-line opener is not part of the value
        if width == 3 {
            let body = &self.content[start..];
            if body.starts_with("\r\n") {
                start += 2;
            } else if body.starts_with('\n') {
                start += 1;
            }
        }
        Some((start, span.end - width))
    }
}

/// From the `[header]` of an expanded table to the end of its last value.
fn expanded_table_extent(table: &Table) -> Option<(usize, usize)> {
    let header = table.span()?;
    let end = table
        .iter()
        .filter_map(|(_, item)| match item {
            Item::Value(value) => value.span().map(|s| s.end),
            Item::Table(child) => child.span().map(|s| s.end),
            _ => None,
        })
        .max()
        .unwrap_or(header.end);
    Some((header.start, end.max(header.end)))
}

/// Constraints implied by an assignment value.
///
/// A bare PEP 440 version pins it with `==`; a specifier list is parsed as
/// is. `*` and Poetry caret/tilde ranges imply nothing.
fn synthetic_constraints(value: &AssignedValue) -> Vec<Constraint> {
    let text = value.text.trim();
    if text.is_empty() || text == "*" || text.starts_with('^') {
        return Vec::new();
    }
    if text.starts_with('~') && !text.starts_with("~=") {
        return Vec::new();
    }

    if Version::from_str(text).is_ok() {
        let leading = value.text.len() - value.text.trim_start().len();
        let start = value.span.start + pyreq_core::utf16_len(&value.text[..leading]);
        let version_span = Span::new(start, start + pyreq_core::utf16_len(text));
        return vec![Constraint {
            operator: Operator::Equal,
            version: text.to_string(),
            span: version_span,
            operator_span: Span::empty(start),
            version_span,
        }];
    }

    extract_constraints(&value.text)
        .map(|constraints| {
            constraints
                .into_iter()
                .map(|mut c| {
                    c.span = c.span.shift(value.span.start);
                    c.operator_span = c.operator_span.shift(value.span.start);
                    c.version_span = c.version_span.shift(value.span.start);
                    c
                })
                .collect()
        })
        .unwrap_or_default()
}
