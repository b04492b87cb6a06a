//! Template discovery: turns files on disk into raw records for the registry.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex_lite::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

use crate::models::RawTemplate;
use crate::registry::{LoadAborted, LoadSummary, TemplateRegistry};

/// A raw template paired with its identifier
pub type RawSource = (String, RawTemplate);

/// Anything that can produce a batch of raw template records
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawSource>>;
}

/// Reads `*.json` records and legacy `*.php` fragments from one directory.
/// The identifier of each template is its file stem.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
    timeout: Duration,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            timeout,
        }
    }
}

#[async_trait]
impl TemplateSource for DirectorySource {
    async fn fetch(&self) -> Result<Vec<RawSource>> {
        tokio::time::timeout(self.timeout, read_dir_sources(&self.dir))
            .await
            .with_context(|| {
                format!(
                    "Timed out after {:?} reading templates from {}",
                    self.timeout,
                    self.dir.display()
                )
            })?
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Json,
    LegacyPhp,
}

fn source_format(path: &Path) -> Option<SourceFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Some(SourceFormat::Json),
        Some("php") => Some(SourceFormat::LegacyPhp),
        _ => None,
    }
}

async fn read_dir_sources(dir: &Path) -> Result<Vec<RawSource>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read template directory {}", dir.display()))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && source_format(&path).is_some() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(format) = source_format(&path) else {
            continue;
        };
        let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
            tracing::warn!("Skipping template with non UTF-8 name: {}", path.display());
            continue;
        };

        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read template {}", path.display()))?;
        let raw = match format {
            SourceFormat::Json => parse_json(&content),
            SourceFormat::LegacyPhp => parse_legacy_php(&content),
        }
        .with_context(|| format!("Failed to parse template {}", path.display()))?;

        tracing::debug!("Read template {} from {}", id, path.display());
        sources.push((id.to_string(), raw));
    }

    Ok(sources)
}

/// Parse a JSON template record; the document must be a single object
pub fn parse_json(content: &str) -> Result<RawTemplate> {
    match serde_json::from_str::<Value>(content)? {
        Value::Object(map) => Ok(map),
        other => bail!("expected a JSON object, found {}", json_kind(&other)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn assignment_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        // $p['key'] = 'text';  |  $p["key"] = "te\"xt";  |  $p['key'] = 1024;
        Regex::new(
            r#"^\s*\$p\[\s*['"]([A-Za-z0-9_]+)['"]\s*\]\s*=\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)"|(-?[0-9]+))\s*;"#,
        )
        .ok()
    })
    .as_ref()
}

/// Resolve backslash escapes the way PHP does for each quote style
fn unescape(body: &str, double_quoted: bool) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match (chars.next(), double_quoted) {
            (Some('\\'), _) => out.push('\\'),
            (Some('\''), false) => out.push('\''),
            (Some('"'), true) => out.push('"'),
            (Some('$'), true) => out.push('$'),
            (Some('n'), true) => out.push('\n'),
            (Some('t'), true) => out.push('\t'),
            (Some('r'), true) => out.push('\r'),
            (Some(other), _) => {
                out.push('\\');
                out.push(other);
            }
            (None, _) => out.push('\\'),
        }
    }
    out
}

/// Extract `$p['key'] = value;` assignments from a legacy PHP template.
///
/// Quoted values become strings and bare integers become numbers. Comments
/// and unrelated lines are ignored, but an assignment to `$p` in any other
/// form (concatenation, floats, expressions) is an error rather than being
/// dropped. A later assignment to the same key wins, as it would when the
/// script runs.
pub fn parse_legacy_php(content: &str) -> Result<RawTemplate> {
    let re = assignment_regex().context("assignment pattern failed to compile")?;
    let mut raw = RawTemplate::new();

    for (index, line) in content.lines().enumerate() {
        let Some(caps) = re.captures(line) else {
            if line.trim_start().starts_with("$p[") {
                bail!("line {}: unsupported assignment: {}", index + 1, line.trim());
            }
            continue;
        };
        let key = caps[1].to_string();
        let value = if let Some(s) = caps.get(2) {
            Value::String(unescape(s.as_str(), false))
        } else if let Some(s) = caps.get(3) {
            Value::String(unescape(s.as_str(), true))
        } else if let Some(n) = caps.get(4) {
            match n.as_str().parse::<i64>() {
                Ok(n) => Value::from(n),
                Err(_) => Value::String(n.as_str().to_string()),
            }
        } else {
            continue;
        };
        raw.insert(key, value);
    }

    if raw.is_empty() {
        bail!("no template assignments found");
    }
    Ok(raw)
}

/// Why a reload did not change the registry
#[derive(Debug, Error)]
pub enum ReloadError {
    /// The source could not be read at all
    #[error("{0:#}")]
    Fetch(anyhow::Error),
    /// The batch was read but rejected by validation
    #[error(transparent)]
    Rejected(#[from] LoadAborted),
}

/// Fetch every template from `source` and commit them to `registry` as one batch.
/// Concurrent reloads run one at a time, in the order they started.
pub async fn reload(
    registry: &TemplateRegistry,
    source: &dyn TemplateSource,
) -> std::result::Result<LoadSummary, ReloadError> {
    let _reload = registry.reload_guard().await;
    let sources = source.fetch().await.map_err(|e| {
        tracing::warn!("Template fetch failed, keeping current templates: {:#}", e);
        ReloadError::Fetch(e)
    })?;
    Ok(registry.load(sources)?)
}
