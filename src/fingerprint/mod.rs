//! Input fingerprints for skipping redundant batch compiles.
//!
//! A fingerprint covers a set of key/value properties plus the SHA-256 of
//! every input file. For a compile with a depfile, the input set is the
//! configured entry points plus everything the depfile lists. Fingerprints
//! are persisted next to the depfile as `<depfile>.fingerprint`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::utils::DriverError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompileFingerprint {
    properties: BTreeMap<String, String>,
    files: BTreeMap<String, String>,
}

impl CompileFingerprint {
    /// Hash every input file. Fails when any input is unreadable; a compile
    /// whose inputs cannot be hashed is never skipped.
    pub fn collect(
        properties: &BTreeMap<String, String>,
        inputs: &[PathBuf],
    ) -> Result<Self, DriverError> {
        let mut files = BTreeMap::new();
        for path in inputs {
            let bytes = std::fs::read(path)?;
            files.insert(path.to_string_lossy().into_owned(), sha256_hex(&bytes));
        }
        Ok(Self { properties: properties.clone(), files })
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Persistence and comparison of fingerprints.
pub trait FingerprintStore: Send + Sync {
    /// Whether the fingerprint stored at `path` equals `fingerprint`.
    /// Anything missing or unreadable means no.
    fn matches(&self, path: &Path, fingerprint: &CompileFingerprint) -> bool;

    fn persist(&self, path: &Path, fingerprint: &CompileFingerprint) -> Result<(), DriverError>;
}

/// Store that writes fingerprints as JSON files.
#[derive(Default)]
pub struct JsonFingerprintStore;

impl FingerprintStore for JsonFingerprintStore {
    fn matches(&self, path: &Path, fingerprint: &CompileFingerprint) -> bool {
        let Ok(content) = std::fs::read_to_string(path) else {
            return false;
        };
        match serde_json::from_str::<CompileFingerprint>(&content) {
            Ok(stored) => stored == *fingerprint,
            Err(err) => {
                tracing::debug!("discarding unreadable fingerprint {}: {err}", path.display());
                false
            }
        }
    }

    fn persist(&self, path: &Path, fingerprint: &CompileFingerprint) -> Result<(), DriverError> {
        std::fs::write(path, serde_json::to_string_pretty(fingerprint)?)?;
        Ok(())
    }
}

/// Decides whether a batch compile can be skipped, and records the inputs
/// of a compile that ran.
pub struct FingerprintGate {
    store: Arc<dyn FingerprintStore>,
    fingerprint_path: PathBuf,
    depfile_path: PathBuf,
    properties: BTreeMap<String, String>,
    inputs: Vec<PathBuf>,
}

impl FingerprintGate {
    pub fn new(
        store: Arc<dyn FingerprintStore>,
        depfile_path: &Path,
        properties: BTreeMap<String, String>,
        inputs: Vec<PathBuf>,
    ) -> Self {
        let mut fingerprint_path = depfile_path.as_os_str().to_owned();
        fingerprint_path.push(".fingerprint");
        Self {
            store,
            fingerprint_path: PathBuf::from(fingerprint_path),
            depfile_path: depfile_path.to_path_buf(),
            properties,
            inputs,
        }
    }

    /// True when the previous compile's fingerprint covers the current
    /// inputs. A missing depfile (first build) never matches.
    pub fn matches(&self) -> bool {
        let current = match self.current_fingerprint() {
            Ok(fingerprint) => fingerprint,
            Err(err) => {
                tracing::debug!("fingerprint check failed, compiling: {err}");
                return false;
            }
        };
        self.store.matches(&self.fingerprint_path, &current)
    }

    /// Persist the fingerprint of the compile that just ran.
    pub fn persist(&self) -> Result<(), DriverError> {
        let current = self.current_fingerprint()?;
        self.store.persist(&self.fingerprint_path, &current)
    }

    fn current_fingerprint(&self) -> Result<CompileFingerprint, DriverError> {
        let mut inputs = self.inputs.clone();
        inputs.extend(depfile_inputs(&self.depfile_path)?);
        CompileFingerprint::collect(&self.properties, &inputs)
    }
}

/// Parse a Make-style depfile into its input paths. Spaces escaped with a
/// backslash belong to the path. Paths under `/b/build/slave/` only exist
/// on build machines and are dropped.
pub fn depfile_inputs(path: &Path) -> Result<Vec<PathBuf>, DriverError> {
    let content = std::fs::read_to_string(path)?;
    let dependencies = content.split_once(':').map_or("", |(_, rest)| rest);
    Ok(split_on_unescaped_spaces(dependencies)
        .into_iter()
        .filter(|dep| !dep.starts_with("/b/build/slave/"))
        .map(PathBuf::from)
        .collect())
}

fn split_on_unescaped_spaces(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&' ') => {
                current.push(' ');
                chars.next();
            }
            ch if ch.is_whitespace() => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            ch => current.push(ch),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
