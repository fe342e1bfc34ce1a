//! Canonicalization of source file paths into package and virtual
//! filesystem URIs.

pub mod file_uri;
pub mod mapper;
pub mod package_map;

pub use file_uri::{ensure_trailing_slash, file_uri, path_from_file_uri};
pub use mapper::SourceUriMapper;
pub use package_map::PackageMap;
