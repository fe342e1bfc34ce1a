use std::fmt;
use std::str::FromStr;

use crate::utils::DriverError;

/// Compilation target the frontend server builds for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetModel {
    /// Mobile and desktop embedders.
    Flutter,

    /// The Fuchsia runner.
    FlutterRunner,
}

impl Default for TargetModel {
    fn default() -> Self {
        Self::Flutter
    }
}

impl FromStr for TargetModel {
    type Err = DriverError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "flutter" => Ok(Self::Flutter),
            "flutter_runner" => Ok(Self::FlutterRunner),
            other => Err(DriverError::UnknownTarget(other.to_string())),
        }
    }
}

impl fmt::Display for TargetModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flutter => write!(f, "flutter"),
            Self::FlutterRunner => write!(f, "flutter_runner"),
        }
    }
}
