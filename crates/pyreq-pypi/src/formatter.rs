//! Presentation of package metadata for hover, code lens and completion.

use crate::registry::package_url;
use crate::types::{PackageInfo, PackageMetadata, ReleaseSummary, RequirementSource, RequirementSpec};
use pep440_rs::{Version, VersionSpecifiers};
use std::str::FromStr;

/// Hover text for a package that does not exist on the index.
pub const NOT_FOUND_MESSAGE: &str = "Package not found in PyPI";

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

fn linkify(text: &str, link: Option<&str>) -> String {
    match link.filter(|l| !l.is_empty()) {
        Some(link) => format!("[{}]({})", text, link),
        None => text.to_string(),
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Strips a trailing "License"/"Licence" word, since the line already says "licensed".
fn short_license(license: &str) -> String {
    let lower = license.to_ascii_lowercase();
    for suffix in [" license", " licence"] {
        if lower.ends_with(suffix) {
            return license[..license.len() - suffix.len()].to_string();
        }
    }
    license.to_string()
}

fn byline(info: &PackageInfo) -> Option<String> {
    let author = non_empty(info.author.as_ref()).map(|author| {
        match non_empty(info.author_email.as_ref()) {
            Some(email) => format!("By {} ({}).", author, email),
            None => format!("By {}.", author),
        }
    });
    let license = non_empty(info.license.as_ref())
        // Full license texts end up in this field; only short names are worth showing.
        .filter(|l| !l.contains('\n'))
        .map(|l| format!("{} licensed.", short_license(l)));

    match (author, license) {
        (Some(a), Some(l)) => Some(format!("{} {}", a, l)),
        (a, l) => a.or(l),
    }
}

/// Builds the hover markdown for a requirement.
///
/// # Examples
///
/// ```
/// use pyreq_pypi::formatter::hover_markdown;
/// use pyreq_pypi::requirement::extract;
/// use pyreq_pypi::types::{PackageInfo, PackageMetadata};
///
/// let spec = extract("requests>=2.0").unwrap();
/// let metadata = PackageMetadata {
///     info: PackageInfo {
///         name: "requests".into(),
///         version: "2.31.0".into(),
///         ..Default::default()
///     },
///     ..Default::default()
/// };
///
/// let markdown = hover_markdown(&metadata, &spec);
/// assert!(markdown.contains("Latest version: 2.31.0."));
/// assert!(markdown.contains("`>=2.0`"));
/// ```
pub fn hover_markdown(metadata: &PackageMetadata, spec: &RequirementSpec) -> String {
    let info = &metadata.info;
    let name = if info.name.is_empty() {
        spec.raw_identifier.as_str()
    } else {
        info.name.as_str()
    };
    let fallback_url = package_url(name);
    let page = non_empty(info.package_url.as_ref()).unwrap_or(&fallback_url);

    let mut head = format!("**{}", linkify(name, Some(page)));
    if let Some(summary) = non_empty(info.summary.as_ref()) {
        head.push_str(&format!(" - {}", linkify(summary, non_empty(info.home_page.as_ref()))));
    }
    head.push_str("**");

    let mut parts = vec![head];
    parts.extend(byline(info));

    if !info.version.is_empty() {
        parts.push(format!(
            "Latest version: {}.",
            linkify(&info.version, non_empty(info.release_url.as_ref()))
        ));
    }

    match &spec.source {
        RequirementSource::Registry if !spec.constraints.is_empty() => {
            parts.push(format!("Requirement: `{}`", spec.constraint_text()));
        }
        RequirementSource::Url { url } => {
            parts.push(format!("Direct reference: `{}`", url));
        }
        RequirementSource::Registry => {}
    }

    parts.join("\n\n")
}

/// Returns true when `version` satisfies the PEP 440 specifier list.
///
/// Unparseable versions or specifiers never satisfy.
pub fn version_satisfies(version: &str, specifiers: &str) -> bool {
    let Ok(ver) = Version::from_str(version) else {
        return false;
    };

    let Ok(specs) = VersionSpecifiers::from_str(specifiers) else {
        return false;
    };

    specs.contains(&ver)
}

/// Code lens title for a requirement.
pub fn lens_title(metadata: &PackageMetadata, spec: &RequirementSpec) -> String {
    let latest = &metadata.info.version;
    if !spec.constraints.is_empty() && version_satisfies(latest, &spec.constraint_text()) {
        format!("latest: {} (satisfied)", latest)
    } else {
        format!("latest: {}", latest)
    }
}

/// Completion label, e.g. `>=2.31.0`.
pub fn completion_label(prefix: &str, version: &str) -> String {
    format!("{}{}", prefix, version)
}

/// Formats an ISO 8601 upload time as `7 December 2023`.
pub fn release_date(upload_time: &str) -> Option<String> {
    let date = upload_time.get(..10)?;
    let mut fields = date.split('-');
    let year: u32 = fields.next()?.parse().ok()?;
    let month: usize = fields.next()?.parse().ok()?;
    let day: u32 = fields.next()?.parse().ok()?;
    let month = MONTHS.get(month.checked_sub(1)?)?;
    Some(format!("{} {} {}", day, month, year))
}

/// Completion detail for a release.
pub fn completion_detail(release: &ReleaseSummary) -> String {
    let date = release
        .upload_time
        .as_deref()
        .and_then(release_date)
        .unwrap_or_else(|| "unknown date".to_string());
    if release.yanked {
        format!("Released on {} (yanked)", date)
    } else {
        format!("Released on {}", date)
    }
}
