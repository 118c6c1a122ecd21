use anyhow::{Context, Result};
use log::debug;
use std::io::Write;
use std::path::PathBuf;

use super::config::Config;
use super::output::{abandoned_notice, group_header, render_details, render_history, render_json};
use crate::{
    github::ReleaseHistory,
    history::{HistoryProjector, HistoryView},
    repository::{ListedPackage, Mode, RepositorySet},
    resolver::resolve,
    runtime::Runtime,
};

/// What the `history` command was asked for.
#[derive(Debug, Clone)]
pub struct HistoryOptions {
    /// A package name; lists every package when absent.
    pub package: Option<String>,
    pub version: Option<String>,
    pub mode: Mode,
    pub json: bool,
}

#[tracing::instrument(skip(runtime, working_dir, api_url, packagist_url))]
pub async fn history<R: Runtime>(
    runtime: R,
    working_dir: Option<PathBuf>,
    api_url: Option<String>,
    packagist_url: Option<String>,
    options: HistoryOptions,
) -> Result<()> {
    let config = Config::new(runtime, working_dir, api_url, packagist_url)?;
    let set = RepositorySet::build(options.mode, config.catalog()?)?;
    run(&set, &config.github, &options, &mut std::io::stdout()).await
}

#[tracing::instrument(skip(set, github, out))]
pub async fn run<H, W>(set: &RepositorySet, github: &H, options: &HistoryOptions, out: &mut W) -> Result<()>
where
    H: ReleaseHistory + ?Sized,
    W: Write,
{
    let projector = HistoryProjector::new(github);

    let Some(name) = options.package.as_deref() else {
        return list(set, &projector, options, out).await;
    };

    let resolution = resolve(set, name, options.version.as_deref()).await?;
    let package = resolution.found(name)?;
    debug!(
        "Resolved {} to {} (installed: {})",
        name, package, resolution.installed
    );

    if let Some(notice) = abandoned_notice(package) {
        eprintln!("{}", notice);
    }

    let view = projector.project(package).await;

    let text = if options.json {
        render_json(&[view])?
    } else {
        format!("{}\n{}", render_details(package, &resolution), render_history(&view))
    };
    write_out(out, &text)
}

async fn list<H, W>(
    set: &RepositorySet,
    projector: &HistoryProjector<'_, H>,
    options: &HistoryOptions,
    out: &mut W,
) -> Result<()>
where
    H: ReleaseHistory + ?Sized,
    W: Write,
{
    let show_headers = options.mode == Mode::Default && !options.json;
    let mut views: Vec<HistoryView> = Vec::new();
    let mut text = String::new();

    for group in set.listing().await {
        if show_headers {
            text.push_str(&group_header(group.kind));
            text.push('\n');
        }
        for entry in &group.entries {
            // name-only entries carry no metadata to project
            let ListedPackage::Package(package) = entry else {
                continue;
            };
            let view = projector.project(package).await;
            if !options.json {
                text.push_str(&render_history(&view));
                text.push('\n');
            }
            views.push(view);
        }
    }

    if options.json {
        text = render_json(&views)?;
    }
    write_out(out, &text)
}

fn write_out<W: Write>(out: &mut W, text: &str) -> Result<()> {
    writeln!(out, "{}", text.trim_end()).context("Failed to write output")?;
    out.flush().context("Failed to write output")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{MockReleaseHistory, Release};
    use crate::package::Package;
    use crate::repository::{ArrayRepository, PackageSource, SourceKind};
    use serde_json::json;
    use std::sync::Arc;

    fn widget(version: &str) -> Package {
        Package::from_value(json!({
            "name": "alice/widget",
            "version": version,
            "description": "Widgets",
            "license": ["MIT"],
            "time": "2024-01-01T10:00:00+00:00",
            "source": {
                "type": "git",
                "url": "https://github.com/alice/widget.git",
                "reference": "abc"
            }
        }))
        .unwrap()
    }

    fn release(tag: &str, body: &str, date: &str) -> Release {
        Release {
            tag_name: tag.to_string(),
            name: Some(tag.to_string()),
            body: Some(body.to_string()),
            published_at: Some(date.to_string()),
        }
    }

    fn github() -> MockReleaseHistory {
        let mut gh = MockReleaseHistory::new();
        gh.expect_get_releases().returning(|_| {
            Ok(vec![
                release("v1.2.0", "Latest", "2024-03-01T00:00:00Z"),
                release("v1.1.0", "Fixes", "2024-02-01T00:00:00Z"),
                release("v1.0.0", "Initial", "2024-01-01T00:00:00Z"),
            ])
        });
        gh.expect_get_latest_release()
            .returning(|_| Ok(release("v1.2.0", "Latest", "2024-03-01T00:00:00Z")));
        gh
    }

    fn project_set() -> RepositorySet {
        let installed: Arc<dyn PackageSource> = Arc::new(ArrayRepository::new(
            "installed packages",
            SourceKind::Installed,
            vec![widget("v1.0.0")],
        ));
        let platform: Arc<dyn PackageSource> = Arc::new(ArrayRepository::new(
            "platform",
            SourceKind::Platform,
            vec![Package::new("php", "8.3.0").unwrap()],
        ));
        let remote: Arc<dyn PackageSource> = Arc::new(ArrayRepository::new(
            "remote",
            SourceKind::Available,
            vec![widget("v1.0.0"), widget("v1.2.0")],
        ));
        RepositorySet::new(
            vec![installed.clone(), platform.clone(), remote],
            vec![installed, platform],
        )
    }

    fn options(package: Option<&str>, mode: Mode, json: bool) -> HistoryOptions {
        HistoryOptions {
            package: package.map(str::to_string),
            version: None,
            mode,
            json,
        }
    }

    async fn output(set: &RepositorySet, options: &HistoryOptions) -> Result<String> {
        let mut out = Vec::new();
        run(set, &github(), options, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_single_package_json() {
        let out = output(&project_set(), &options(Some("alice/widget"), Mode::Default, true))
            .await
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            value,
            json!([{
                "bundle": "alice/widget",
                "installed": {"name": "v1.0.0", "description": "Initial", "releaseDate": "01/01/24"},
                "latest": {"name": "v1.2.0", "description": "Latest", "releaseDate": "01/03/24"},
                "included": [
                    {"name": "v1.1.0", "description": "Fixes", "releaseDate": "01/02/24"}
                ]
            }])
        );
    }

    #[tokio::test]
    async fn test_single_package_text() {
        let out = output(&project_set(), &options(Some("alice/widget"), Mode::Default, false))
            .await
            .unwrap();

        assert!(out.starts_with("name     : alice/widget\n"));
        assert!(out.contains("versions : v1.2.0, * v1.0.0\n"));
        assert!(out.contains("\nBundle: alice/widget\n"));
        assert!(out.contains("Installed version: v1.0.0 - Initial (01/01/24)\n"));
        assert!(out.ends_with("Included:\nv1.1.0 - Fixes (01/02/24)\n"));
    }

    #[tokio::test]
    async fn test_version_constraint_picks_remote() {
        let mut options = options(Some("alice/widget"), Mode::Default, true);
        options.version = Some("^1.2".to_string());

        let out = output(&project_set(), &options).await.unwrap();

        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["installed"]["name"], "v1.2.0");
        assert_eq!(value[0]["included"], json!([]));
    }

    #[tokio::test]
    async fn test_unknown_package() {
        let err = output(&project_set(), &options(Some("bob/gadget"), Mode::Default, false))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Package bob/gadget not found");
    }

    #[tokio::test]
    async fn test_listing_with_headers() {
        // php has no hosted source and never reaches the service
        let mut gh = MockReleaseHistory::new();
        gh.expect_get_releases().times(2).returning(|_| Ok(vec![]));
        gh.expect_get_latest_release()
            .times(2)
            .returning(|_| Err(anyhow::anyhow!("Resource not found")));

        let mut out = Vec::new();
        run(&project_set(), &gh, &options(None, Mode::Default, false), &mut out)
            .await
            .unwrap();
        let out = String::from_utf8(out).unwrap();

        let platform = out.find("platform:\nBundle: php\n").unwrap();
        let available = out.find("available:\nBundle: alice/widget\nInstalled version: v1.2.0").unwrap();
        let installed = out.find("installed:\nBundle: alice/widget\nInstalled version: v1.0.0").unwrap();
        assert!(platform < available && available < installed);
    }

    #[tokio::test]
    async fn test_listing_json_without_headers() {
        let installed: Arc<dyn PackageSource> = Arc::new(ArrayRepository::new(
            "installed packages",
            SourceKind::Installed,
            vec![widget("v1.0.0")],
        ));
        let set = RepositorySet::new(vec![installed.clone()], vec![installed]);

        let out = output(&set, &options(None, Mode::Installed, true)).await.unwrap();

        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
        assert_eq!(value[0]["bundle"], "alice/widget");
        assert!(!out.contains("installed:"));
    }

    #[tokio::test]
    async fn test_listing_text_in_mode_has_no_headers() {
        let installed: Arc<dyn PackageSource> = Arc::new(ArrayRepository::new(
            "installed packages",
            SourceKind::Installed,
            vec![widget("v1.0.0")],
        ));
        let set = RepositorySet::new(vec![installed.clone()], vec![installed]);

        let out = output(&set, &options(None, Mode::Installed, false)).await.unwrap();

        assert!(out.starts_with("Bundle: alice/widget\n"));
    }
}
