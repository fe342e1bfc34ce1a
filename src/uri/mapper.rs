//! Mapping of absolute source paths into `package:` URIs.

use std::path::Path;

use crate::uri::file_uri::file_uri;
use crate::uri::package_map::PackageMap;

/// Maps filesystem paths under one package's prefix into `package:` URIs.
///
/// Construction picks at most one package from the map: with a virtual
/// filesystem configured, the first package whose prefix mentions the vfs
/// scheme wins and the vfs roots become the matching prefixes; otherwise
/// the first package whose prefix is a proper prefix of the script's file
/// URI wins. When nothing matches the mapper is empty and [`map`] always
/// yields `None`.
///
/// [`map`]: SourceUriMapper::map
#[derive(Debug, Clone, Default)]
pub struct SourceUriMapper {
    package_name: Option<String>,
    prefixes: Vec<String>,
}

impl SourceUriMapper {
    pub fn new(
        script_path: &str,
        packages: &PackageMap,
        vfs_scheme: Option<&str>,
        vfs_roots: &[String],
    ) -> Self {
        let script_uri = file_uri(script_path);
        for (name, prefix) in packages.iter() {
            if let Some(scheme) = vfs_scheme {
                if !vfs_roots.is_empty() && prefix.contains(scheme) {
                    return Self {
                        package_name: Some(name.to_string()),
                        prefixes: vfs_roots.iter().map(|root| file_uri(root)).collect(),
                    };
                }
            }
            if script_uri.starts_with(prefix) && script_uri.len() > prefix.len() {
                return Self {
                    package_name: Some(name.to_string()),
                    prefixes: vec![prefix.to_string()],
                };
            }
        }
        Self::default()
    }

    /// Convenience constructor that reads the package map from disk. An
    /// unreadable map yields an empty mapper.
    pub fn from_packages_file(
        script_path: &str,
        packages_path: &Path,
        vfs_scheme: Option<&str>,
        vfs_roots: &[String],
    ) -> Self {
        match PackageMap::load(packages_path) {
            Ok(map) => Self::new(script_path, &map, vfs_scheme, vfs_roots),
            Err(err) => {
                tracing::warn!(
                    "could not read package map {}: {err}",
                    packages_path.display()
                );
                Self::default()
            }
        }
    }

    /// Map an absolute path to a `package:` URI, or `None` when the path is
    /// outside every prefix. Prefixes are tried in construction order.
    pub fn map(&self, path: &str) -> Option<String> {
        let package_name = self.package_name.as_deref()?;
        let uri = file_uri(path);
        for prefix in &self.prefixes {
            if let Some(rest) = uri.strip_prefix(prefix.as_str()) {
                return Some(format!("package:{package_name}/{rest}"));
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.package_name.is_none()
    }
}
