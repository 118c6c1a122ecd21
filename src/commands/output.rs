//! Text and JSON rendering of package details and history views.

use anyhow::{Context, Result};

use crate::history::{HistoryView, ReleaseEntry};
use crate::package::{LinkKind, Location, Package, describe_license};
use crate::resolver::ResolutionResult;
use crate::repository::SourceKind;

/// Link sections printed after the metadata block, with suggestions after
/// the dev requirements.
const LINK_SECTIONS: [LinkKind; 2] = [LinkKind::Require, LinkKind::RequireDev];
const TRAILING_LINK_SECTIONS: [LinkKind; 3] =
    [LinkKind::Provide, LinkKind::Conflict, LinkKind::Replace];

pub fn render_json(views: &[HistoryView]) -> Result<String> {
    serde_json::to_string(views).context("Failed to serialize history")
}

fn entry_line(entry: &ReleaseEntry) -> String {
    format!(
        "{} - {} ({})",
        entry.name,
        entry.description.as_deref().unwrap_or_default(),
        entry.release_date.as_deref().unwrap_or_default()
    )
}

/// The plain-text history block of one package.
pub fn render_history(view: &HistoryView) -> String {
    let mut out = String::new();
    out.push_str(&format!("Bundle: {}\n", view.bundle));
    out.push_str(&format!("Installed version: {}\n", entry_line(&view.installed)));
    match &view.latest {
        Some(latest) => {
            out.push_str(&format!("Latest version: {}\n", entry_line(latest)));
        }
        None => {
            out.push_str("Latest version: No releases available\n");
        }
    }
    out.push_str("Included:\n");
    for entry in &view.included {
        out.push_str(&format!("{}\n", entry_line(entry)));
    }
    out
}

/// Listing group header, shown only when no mode flag narrows the listing.
pub fn group_header(kind: SourceKind) -> String {
    format!("{}:", kind)
}

fn location_line(location: Option<&Location>) -> String {
    let (kind, url, reference) = match location {
        Some(l) => (l.kind.as_str(), l.url.as_str(), l.reference.as_deref().unwrap_or_default()),
        None => ("", "", ""),
    };
    format!("[{}] {} {}", kind, url, reference).trim_end().to_string()
}

/// Pretty versions newest first; the installed one is marked with `*`.
fn versions_line(package: &Package, resolution: &ResolutionResult) -> String {
    resolution
        .sorted_versions()
        .into_iter()
        .map(|version| {
            if resolution.installed && version == package.pretty_version {
                format!("* {}", version)
            } else {
                version.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Metadata block and link sections for a single package.
pub fn render_details(package: &Package, resolution: &ResolutionResult) -> String {
    let mut out = String::new();

    out.push_str(&format!("name     : {}\n", package.pretty_name));
    out.push_str(&format!(
        "descrip. : {}\n",
        package.description.as_deref().unwrap_or_default()
    ));
    out.push_str(&format!("keywords : {}\n", package.keywords.join(", ")));
    out.push_str(&format!("versions : {}\n", versions_line(package, resolution)));
    out.push_str(&format!("type     : {}\n", package.package_type));
    for license in &package.licenses {
        out.push_str(&format!("license  : {}\n", describe_license(license)));
    }
    out.push_str(&format!("source   : {}\n", location_line(package.source.as_ref())));
    out.push_str(&format!("dist     : {}\n", location_line(package.dist.as_ref())));
    out.push_str(&format!("names    : {}\n", package.names().join(", ")));

    if !package.support.is_empty() {
        out.push_str("\nsupport\n");
        for (kind, url) in &package.support {
            out.push_str(&format!("{} : {}\n", kind, url));
        }
    }

    let autoload = &package.autoload;
    if !autoload.is_empty() {
        out.push_str("\nautoload\n");
        for (title, rules) in [("psr-0", &autoload.psr_0), ("psr-4", &autoload.psr_4)] {
            if rules.is_empty() {
                continue;
            }
            out.push_str(&format!("{}\n", title));
            for (namespace, paths) in rules {
                let namespace = if namespace.is_empty() { "*" } else { namespace };
                out.push_str(&format!("{} => {}\n", namespace, paths));
            }
        }
        if !autoload.classmap.is_empty() {
            out.push_str("classmap\n");
            out.push_str(&format!("{}\n", autoload.classmap.join(", ")));
        }
        if !package.include_paths.is_empty() {
            out.push_str("include-path\n");
            out.push_str(&format!("{}\n", package.include_paths.join(", ")));
        }
    }

    for kind in LINK_SECTIONS {
        render_links(&mut out, package, kind);
    }
    if !package.suggests.is_empty() {
        out.push_str("\nsuggests\n");
        for (name, reason) in &package.suggests {
            out.push_str(&format!("{} {}\n", name, reason));
        }
    }
    for kind in TRAILING_LINK_SECTIONS {
        render_links(&mut out, package, kind);
    }

    out
}

fn render_links(out: &mut String, package: &Package, kind: LinkKind) {
    let links = package.links(kind);
    if links.is_empty() {
        return;
    }
    out.push_str(&format!("\n{}\n", kind.title()));
    for link in links {
        out.push_str(&format!("{}\n", link));
    }
}

/// Warning for abandoned packages, naming the replacement when there is one.
pub fn abandoned_notice(package: &Package) -> Option<String> {
    if !package.abandoned {
        return None;
    }
    let replacement = package
        .replacement_package
        .as_ref()
        .map(|r| format!(" The author suggests using the {} package instead.", r))
        .unwrap_or_default();
    Some(format!(
        "Attention: This package is abandoned and no longer maintained.{}",
        replacement
    ))
}
