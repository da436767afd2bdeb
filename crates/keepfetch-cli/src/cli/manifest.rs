//! Turning URLs and manifest files into `(source, destination)` pairs.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use url::Url;

/// One file to fetch and where it lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub url: String,
    pub destination: PathBuf,
}

/// Parse `URL [DEST]` lines. Relative destinations are joined onto `dest_dir`;
/// a line without one gets `default_destination`.
pub fn parse_manifest(text: &str, dest_dir: &Path) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let lineno = i + 1;
        let mut fields = line.split_whitespace();
        let (Some(url), dest, None) = (fields.next(), fields.next(), fields.next()) else {
            bail!("manifest line {}: expected `URL [DEST]`", lineno);
        };
        let destination = match dest {
            Some(dest) => dest_dir.join(dest),
            None => default_destination(url, dest_dir)
                .with_context(|| format!("manifest line {}", lineno))?,
        };
        entries.push(Entry {
            url: url.to_string(),
            destination,
        });
    }
    Ok(entries)
}

/// `dest_dir/<last path segment>`, or `dest_dir/index.html` for a bare host.
pub fn default_destination(url: &str, dest_dir: &Path) -> Result<PathBuf> {
    let parsed = Url::parse(url).with_context(|| format!("not a URL: {}", url))?;
    let name = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or("index.html");
    Ok(dest_dir.join(name))
}
