use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;

/// A chart directory named by a path argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartDir {
    /// First path segment, e.g. `charts`.
    pub parent: PathBuf,
    /// Second path segment, e.g. `mychart`.
    pub name: String,
}

impl ChartDir {
    pub fn descriptor_path(&self, root: &Path, descriptor: &str) -> PathBuf {
        root.join(&self.parent).join(&self.name).join(descriptor)
    }
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct ChartSummary {
    pub directories: Vec<String>,
    pub versions: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ChartDescriptor {
    version: Option<Value>,
}

/// Chart directory for `arg`, or `None` when it has fewer than two segments.
pub fn chart_dir(arg: &str) -> Option<ChartDir> {
    let mut segments = Path::new(arg).components().filter_map(|c| match c {
        Component::Normal(s) => s.to_str(),
        _ => None,
    });
    let parent = segments.next()?;
    let name = segments.next()?;
    Some(ChartDir {
        parent: PathBuf::from(parent),
        name: name.to_string(),
    })
}

/// Unique chart directories in order of first appearance.
pub fn collect_dirs<'a, I>(args: I) -> Vec<ChartDir>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut dirs: Vec<ChartDir> = Vec::new();
    for arg in args {
        let Some(dir) = chart_dir(arg) else {
            tracing::warn!("charts: {} has no chart directory segment, skipping", arg);
            continue;
        };
        if dirs.iter().any(|d| d.name == dir.name) {
            continue;
        }
        dirs.push(dir);
    }
    dirs
}

#[derive(Debug, PartialEq, Eq)]
enum VersionField {
    Text(String),
    /// Parsed as a YAML float, so `1.10` has already become `1.1`.
    Number(String),
}

fn version_field(value: Option<Value>, path: &Path) -> Result<VersionField> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Ok(VersionField::Text(s)),
        Some(Value::Number(n)) => Ok(VersionField::Number(n.to_string())),
        None | Some(Value::Null) | Some(Value::String(_)) => {
            bail!("no version field in {}", path.display())
        }
        Some(other) => bail!("unsupported version value {:?} in {}", other, path.display()),
    }
}

pub async fn read_version(path: &Path) -> Result<String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let descriptor: ChartDescriptor = serde_yaml_ng::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    let version = match version_field(descriptor.version, path)? {
        VersionField::Text(version) => version,
        VersionField::Number(version) => {
            tracing::warn!(
                "charts: version in {} is a YAML number and reads as {}; quote it to keep it verbatim",
                path.display(),
                version
            );
            version
        }
    };
    if semver::Version::parse(&version).is_err() {
        tracing::warn!(
            "charts: version {} in {} is not a valid semantic version",
            version,
            path.display()
        );
    }
    Ok(version)
}

pub async fn aggregate<'a, I>(root: &Path, args: I, descriptor: &str) -> Result<ChartSummary>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut summary = ChartSummary::default();
    for dir in collect_dirs(args) {
        let version = read_version(&dir.descriptor_path(root, descriptor)).await?;
        tracing::debug!("charts: {} at version {}", dir.name, version);
        summary.versions.insert(dir.name.clone(), version);
        summary.directories.push(dir.name);
    }
    Ok(summary)
}

/// One `key=<json>` line for CI log scraping.
pub fn render(key: &str, summary: &ChartSummary) -> Result<String> {
    let json = serde_json::to_string(summary).context("failed to encode chart summary")?;
    Ok(format!("{}={}", key, json))
}
