//! Requirement, cursor-context and PyPI metadata types.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use tower_lsp_server::ls_types::Range;

/// A PEP 440 comparison operator.
///
/// A lone `=` is accepted on input and normalized to [`Operator::Equal`].
///
/// # Examples
///
/// ```
/// use pyreq_pypi::types::Operator;
///
/// assert_eq!(Operator::parse("="), Some(Operator::Equal));
/// assert_eq!(Operator::parse("~="), Some(Operator::Compatible));
/// assert_eq!(Operator::GreaterEqual.complement(), Operator::Less);
/// assert_eq!(Operator::ArbitraryEqual.as_str(), "===");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `===`
    ArbitraryEqual,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `~=`
    Compatible,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ArbitraryEqual => "===",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Compatible => "~=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
        }
    }

    /// Parses a complete operator token.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "===" => Some(Self::ArbitraryEqual),
            "==" | "=" => Some(Self::Equal),
            "!=" => Some(Self::NotEqual),
            "~=" => Some(Self::Compatible),
            "<" => Some(Self::Less),
            "<=" => Some(Self::LessEqual),
            ">" => Some(Self::Greater),
            ">=" => Some(Self::GreaterEqual),
            _ => None,
        }
    }

    /// The operator that closes a version range opened by `self`.
    ///
    /// `>` pairs with `<=`, `>=` with `<`, and the reverse. Every other
    /// operator pairs with `==`.
    pub fn complement(self) -> Self {
        match self {
            Self::Greater => Self::LessEqual,
            Self::GreaterEqual => Self::Less,
            Self::Less => Self::GreaterEqual,
            Self::LessEqual => Self::Greater,
            _ => Self::Equal,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open column span `[start, end)` on a single line, in UTF-16 units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub const fn empty(at: u32) -> Self {
        Self { start: at, end: at }
    }

    #[must_use]
    pub const fn shift(self, by: u32) -> Self {
        Self {
            start: self.start + by,
            end: self.end + by,
        }
    }

    /// `true` if `col` lies in `[start, end]`; the end is inclusive so a
    /// cursor sitting right after the last character still counts.
    pub const fn touches(self, col: u32) -> bool {
        self.start <= col && col <= self.end
    }

    pub const fn is_empty(self) -> bool {
        self.start >= self.end
    }
}

/// One `(operator, version)` pair with its source columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub operator: Operator,
    pub version: String,
    /// Operator and version together
    pub span: Span,
    pub operator_span: Span,
    pub version_span: Span,
}

impl Constraint {
    #[must_use]
    fn shifted(mut self, by: u32) -> Self {
        self.span = self.span.shift(by);
        self.operator_span = self.operator_span.shift(by);
        self.version_span = self.version_span.shift(by);
        self
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator, self.version)
    }
}

/// Where a requirement is installed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementSource {
    /// Resolved against the package index
    Registry,
    /// PEP 508 direct reference (`name @ url`)
    Url { url: String },
}

/// One parsed dependency declaration.
///
/// Spans are UTF-16 columns relative to the text handed to the extractor;
/// [`ParsedRequirement::offset_base`] says how they relate to the line.
///
/// # Examples
///
/// ```
/// use pyreq_pypi::requirement::extract;
/// use pyreq_pypi::types::Operator;
///
/// let spec = extract("Flask[async] >= 3.0").unwrap();
/// assert_eq!(spec.identifier, "flask");
/// assert_eq!(spec.raw_identifier, "Flask");
/// assert_eq!(spec.extras, vec!["async"]);
/// assert_eq!(spec.constraints[0].operator, Operator::GreaterEqual);
/// assert_eq!(spec.head_end(), 12);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementSpec {
    /// Normalized name (lowercase, separator runs collapsed to `-`)
    pub identifier: String,
    /// Name exactly as written
    pub raw_identifier: String,
    pub extras: Vec<String>,
    pub constraints: Vec<Constraint>,
    /// Environment marker text after `;`
    pub markers: Option<String>,
    pub source: RequirementSource,
    pub name_span: Span,
    /// Includes the brackets
    pub extras_span: Option<Span>,
}

impl RequirementSpec {
    /// Column right after the name and extras.
    pub fn head_end(&self) -> u32 {
        self.extras_span.map_or(self.name_span.end, |s| s.end)
    }

    /// Constraints joined the way PEP 440 writes them (`>=1.0,<2.0`).
    pub fn constraint_text(&self) -> String {
        self.constraints
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Moves every span `by` columns to the right.
    #[must_use]
    pub fn shifted(mut self, by: u32) -> Self {
        self.name_span = self.name_span.shift(by);
        self.extras_span = self.extras_span.map(|s| s.shift(by));
        self.constraints = self
            .constraints
            .into_iter()
            .map(|c| c.shifted(by))
            .collect();
        self
    }
}

/// Coordinate convention of a requirement's spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetBase {
    /// Columns count from the start of the requirement's range
    RangeStart,
    /// Columns count from the start of the line
    LineStart,
}

/// The two supported document dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Line-oriented pip requirements file
    Requirements,
    /// `pyproject.toml`
    Pyproject,
}

/// Section of a document where a requirement is declared.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DependencySection {
    /// A line of a requirements file
    RequirementsFile,
    /// `project.dependencies`
    Project,
    /// `project.optional-dependencies.<extra>`
    OptionalDependencies { extra: String },
    /// `dependency-groups.<group>`
    DependencyGroup { group: String },
    /// `build-system.requires`
    BuildSystem,
    /// `tool.uv.dev-dependencies`
    UvDev,
    /// `tool.uv.constraint-dependencies`
    UvConstraint,
    /// `tool.uv.override-dependencies`
    UvOverride,
    /// `tool.poetry.dependencies`
    Poetry,
    /// `tool.poetry.dev-dependencies`
    PoetryDev,
    /// `tool.poetry.group.<group>.dependencies`
    PoetryGroup { group: String },
    /// `tool.pixi.pypi-dependencies`
    Pixi,
    /// `tool.pixi.feature.<feature>.pypi-dependencies`
    PixiFeature { feature: String },
}

impl fmt::Display for DependencySection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequirementsFile => f.write_str("requirements"),
            Self::Project => f.write_str("project.dependencies"),
            Self::OptionalDependencies { extra } => {
                write!(f, "project.optional-dependencies.{extra}")
            }
            Self::DependencyGroup { group } => write!(f, "dependency-groups.{group}"),
            Self::BuildSystem => f.write_str("build-system.requires"),
            Self::UvDev => f.write_str("tool.uv.dev-dependencies"),
            Self::UvConstraint => f.write_str("tool.uv.constraint-dependencies"),
            Self::UvOverride => f.write_str("tool.uv.override-dependencies"),
            Self::Poetry => f.write_str("tool.poetry.dependencies"),
            Self::PoetryDev => f.write_str("tool.poetry.dev-dependencies"),
            Self::PoetryGroup { group } => write!(f, "tool.poetry.group.{group}.dependencies"),
            Self::Pixi => f.write_str("tool.pixi.pypi-dependencies"),
            Self::PixiFeature { feature } => {
                write!(f, "tool.pixi.feature.{feature}.pypi-dependencies")
            }
        }
    }
}

/// A TOML string value attached to an assignment-style requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedValue {
    /// String content without quotes
    pub text: String,
    pub line: u32,
    /// Content columns on `line`
    pub span: Span,
}

/// How a requirement is written down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationStyle {
    /// A full specifier string (`"requests>=2"`, or a requirements line)
    Specifier,
    /// `name = <value>` where the key is the package name
    Assignment { value: Option<AssignedValue> },
}

/// A requirement located in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequirement {
    pub spec: RequirementSpec,
    pub range: Range,
    pub offset_base: OffsetBase,
    pub section: DependencySection,
    pub style: DeclarationStyle,
}

impl ParsedRequirement {
    pub fn identifier(&self) -> &str {
        &self.spec.identifier
    }

    /// Column on the range's first line that span offsets are relative to.
    pub fn origin(&self) -> u32 {
        match self.offset_base {
            OffsetBase::RangeStart => self.range.start.character,
            OffsetBase::LineStart => 0,
        }
    }
}

/// What kind of position the cursor was resolved at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// On an existing constraint
    InsideConstraint,
    /// Past a constraint, separated only by whitespace
    AfterConstraint,
    /// After a trailing comma, starting a new bound
    RangeContinuation,
    /// After the name and extras, before any constraint
    AfterName,
    /// Inside a partially typed operator or version
    PartialOperator,
}

/// Completion intent at a cursor inside a version constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorContext {
    /// Operator the completion label starts with
    pub operator: Operator,
    /// Line columns a chosen completion overwrites; empty for pure insertion
    pub replace: Span,
    pub kind: ContextKind,
}

impl CursorContext {
    pub fn insert_text(&self, version: &str) -> String {
        format!("{}{}", self.operator, version)
    }
}

/// Completion intent inside a TOML assignment value (`requests = "^2.22"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueContext {
    /// Operator text kept in front of the version, possibly `^`, `~` or empty
    pub prefix: String,
    pub replace: Span,
}

impl ValueContext {
    pub fn insert_text(&self, version: &str) -> String {
        format!("{}{}", self.prefix, version)
    }
}

/// Project metadata from the PyPI JSON API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub home_page: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub author_email: Option<String>,
    #[serde(default)]
    pub package_url: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    pub version: String,
    #[serde(default)]
    pub release_url: Option<String>,
}

/// A single distribution file of a release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReleaseFile {
    #[serde(default)]
    pub upload_time: Option<String>,
    #[serde(default)]
    pub yanked: bool,
}

/// Response of `https://pypi.org/pypi/{name}/json`.
///
/// # Examples
///
/// ```
/// use pyreq_pypi::types::PackageMetadata;
///
/// let json = r#"{
///     "info": {"name": "requests", "version": "2.28.0"},
///     "releases": {"2.28.0": [{"upload_time": "2022-06-29T00:00:00"}], "0.0.1": []}
/// }"#;
/// let metadata: PackageMetadata = serde_json::from_str(json).unwrap();
/// assert_eq!(metadata.info.version, "2.28.0");
/// assert!(metadata.releases["0.0.1"].is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PackageMetadata {
    pub info: PackageInfo,
    #[serde(default)]
    pub releases: BTreeMap<String, Vec<ReleaseFile>>,
}

/// One entry of a version list, ready for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSummary {
    pub version: String,
    pub upload_time: Option<String>,
    pub yanked: bool,
    pub prerelease: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp_server::ls_types::Position;

    #[test]
    fn test_operator_round_trip_strings() {
        for token in ["===", "==", "!=", "~=", "<", "<=", ">", ">="] {
            assert_eq!(Operator::parse(token).unwrap().as_str(), token);
        }
        assert_eq!(Operator::parse("="), Some(Operator::Equal));
        assert_eq!(Operator::parse("=>"), None);
        assert_eq!(Operator::parse(""), None);
    }

    #[test]
    fn test_operator_complement() {
        assert_eq!(Operator::Greater.complement(), Operator::LessEqual);
        assert_eq!(Operator::GreaterEqual.complement(), Operator::Less);
        assert_eq!(Operator::Less.complement(), Operator::GreaterEqual);
        assert_eq!(Operator::LessEqual.complement(), Operator::Greater);
        assert_eq!(Operator::Compatible.complement(), Operator::Equal);
        assert_eq!(Operator::NotEqual.complement(), Operator::Equal);
        assert_eq!(Operator::Equal.complement(), Operator::Equal);
    }

    #[test]
    fn test_span_touches_is_end_inclusive() {
        let span = Span::new(3, 6);
        assert!(span.touches(3));
        assert!(span.touches(6));
        assert!(!span.touches(7));
        assert!(Span::empty(4).is_empty());
    }

    #[test]
    fn test_shifted_moves_every_span() {
        let spec = RequirementSpec {
            identifier: "a".into(),
            raw_identifier: "a".into(),
            extras: vec![],
            constraints: vec![Constraint {
                operator: Operator::Equal,
                version: "1".into(),
                span: Span::new(1, 4),
                operator_span: Span::new(1, 3),
                version_span: Span::new(3, 4),
            }],
            markers: None,
            source: RequirementSource::Registry,
            name_span: Span::new(0, 1),
            extras_span: None,
        }
        .shifted(10);

        assert_eq!(spec.name_span, Span::new(10, 11));
        assert_eq!(spec.constraints[0].span, Span::new(11, 14));
        assert_eq!(spec.constraints[0].version_span, Span::new(13, 14));
        assert_eq!(spec.constraint_text(), "==1");
    }

    #[test]
    fn test_origin_depends_on_offset_base() {
        let spec = crate::requirement::extract("a==1").unwrap();
        let mut req = ParsedRequirement {
            spec,
            range: Range::new(Position::new(0, 4), Position::new(0, 8)),
            offset_base: OffsetBase::RangeStart,
            section: DependencySection::RequirementsFile,
            style: DeclarationStyle::Specifier,
        };
        assert_eq!(req.origin(), 4);
        req.offset_base = OffsetBase::LineStart;
        assert_eq!(req.origin(), 0);
    }

    #[test]
    fn test_section_display() {
        let section = DependencySection::OptionalDependencies {
            extra: "cli".into(),
        };
        assert_eq!(section.to_string(), "project.optional-dependencies.cli");
        assert_eq!(
            DependencySection::PoetryGroup {
                group: "dev".into()
            }
            .to_string(),
            "tool.poetry.group.dev.dependencies"
        );
    }

    #[test]
    fn test_metadata_tolerates_missing_fields() {
        let json = r#"{
            "info": {"name": "django", "version": "1.0", "license": null},
            "releases": {"1.0": [{}], "0.9": [{"upload_time": null, "yanked": true}]}
        }"#;
        let metadata: PackageMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.info.license, None);
        assert_eq!(metadata.releases["1.0"][0].upload_time, None);
        assert!(metadata.releases["0.9"][0].yanked);
    }
}
