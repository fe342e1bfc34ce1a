//! Discovery of the compiler runtime binary and its snapshot.

use std::path::{Path, PathBuf};

/// Locates the pieces needed to launch the frontend server.
pub trait Artifacts: Send + Sync {
    /// The VM binary that hosts the compiler.
    fn compiler_binary(&self) -> PathBuf;

    /// The frontend server snapshot passed as the VM's first argument.
    fn frontend_snapshot(&self) -> PathBuf;
}

/// Conventional engine directory layout: the VM binary and the snapshot
/// side by side.
pub struct SdkLayout {
    engine_dir: PathBuf,
}

impl SdkLayout {
    pub fn new(engine_dir: impl Into<PathBuf>) -> Self {
        Self { engine_dir: engine_dir.into() }
    }
}

impl Artifacts for SdkLayout {
    fn compiler_binary(&self) -> PathBuf {
        let name = if cfg!(windows) { "dart.exe" } else { "dart" };
        self.engine_dir.join(name)
    }

    fn frontend_snapshot(&self) -> PathBuf {
        self.engine_dir.join("frontend_server.dart.snapshot")
    }
}

/// Whether `path` is a regular file the current user can execute.
pub fn is_runnable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}
