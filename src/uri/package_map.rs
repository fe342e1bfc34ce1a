//! Reader for the on-disk package-name → URI map.
//!
//! The `.packages` format is one `name:uri` entry per line, with `#`
//! comments. Relative URIs are resolved against the directory containing
//! the map file. Entries keep their file order; prefix matching elsewhere
//! relies on first-match-wins in exactly that order.

use std::io;
use std::path::Path;

use crate::uri::file_uri::file_uri;

#[derive(Debug, Clone, Default)]
pub struct PackageMap {
    entries: Vec<(String, String)>,
}

impl PackageMap {
    /// Read and parse a package map file.
    pub fn load(path: &Path) -> io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(Self::parse(&content, base))
    }

    /// Parse map content, resolving relative entries against `base`.
    pub fn parse(content: &str, base: &Path) -> Self {
        let mut entries = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((name, uri)) = line.split_once(':') else {
                tracing::warn!("skipping malformed package map entry: {line}");
                continue;
            };
            entries.push((name.to_string(), resolve(uri, base)));
        }
        Self { entries }
    }

    /// Entries in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(name, uri)| (name.as_str(), uri.as_str()))
    }
}

/// A URI with a scheme passes through; anything else is a path relative to
/// the map file's directory and becomes a `file:` URI, keeping any trailing
/// slash.
fn resolve(uri: &str, base: &Path) -> String {
    if uri.contains(':') {
        return uri.to_string();
    }
    let joined = base.join(uri);
    let mut rendered = file_uri(&joined.to_string_lossy());
    if uri.ends_with('/') && !rendered.ends_with('/') {
        rendered.push('/');
    }
    rendered
}
