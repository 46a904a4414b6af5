use std::fmt::Write as _;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::core::version::Version;

const CHECK_NETWORK: &str = "Please check your network connection";
const INSTALL_MANUALLY: &str = "Please enable auto-download or install ngs and ncbi-vdb manually: \
     https://github.com/ncbi/ngs/wiki/Downloads";
const BUILD_FROM_SOURCE: &str = "Please try building ngs and ncbi-vdb from sources: \
     https://github.com/ncbi/ngs/wiki/Building-and-Installing-from-Source";

/// Why a library could not be found
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadCause {
    #[error("auto-download failed - connection problem")]
    ConnectionProblem,

    #[error("auto-download is disabled")]
    DownloadDisabled,

    #[error("download failed - there is no build for your OS/version available")]
    UnsupportedArch,

    #[error("invalid/corrupt library was downloaded, please check your network connection or contact sra-toolkit team")]
    DownloadInvalidLibrary,

    /// The host failed to load a library for a reason other than a missing file
    #[error("host runtime error: {0}")]
    HostRuntime(String),

    #[error("library not found")]
    NotFound,
}

impl LoadCause {
    /// What the user can do about it
    #[must_use]
    pub fn recommendation(&self) -> Option<&'static str> {
        match self {
            Self::ConnectionProblem | Self::DownloadInvalidLibrary => Some(CHECK_NETWORK),
            Self::DownloadDisabled => Some(INSTALL_MANUALLY),
            Self::UnsupportedArch => Some(BUILD_FROM_SOURCE),
            Self::HostRuntime(_) | Self::NotFound => None,
        }
    }
}

/// A library copy rejected because its version is below the minimum
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutdatedLibrary {
    pub path: PathBuf,
    pub version: Version,
}

/// Failure to resolve a library
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibraryLoadError {
    #[error("Cannot load {libname} library: {cause}")]
    NotFound { libname: String, cause: LoadCause },

    #[error("{}", too_old_message(.libname, .outdated))]
    TooOld {
        libname: String,
        outdated: Vec<OutdatedLibrary>,
    },

    #[error("Downloaded {libname} library {} has version {found}, {required} or newer is required", .path.display())]
    IncompatibleVersion {
        libname: String,
        path: PathBuf,
        found: Version,
        required: Version,
    },
}

impl LibraryLoadError {
    #[must_use]
    pub fn libname(&self) -> &str {
        match self {
            Self::NotFound { libname, .. }
            | Self::TooOld { libname, .. }
            | Self::IncompatibleVersion { libname, .. } => libname,
        }
    }

    /// Underlying cause, for the not-found case
    #[must_use]
    pub fn cause(&self) -> Option<&LoadCause> {
        match self {
            Self::NotFound { cause, .. } => Some(cause),
            Self::TooOld { .. } | Self::IncompatibleVersion { .. } => None,
        }
    }

    /// What the user can do about it
    #[must_use]
    pub fn recommendation(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { cause, .. } => cause.recommendation(),
            Self::TooOld { .. } => Some(INSTALL_MANUALLY),
            Self::IncompatibleVersion { .. } => Some(BUILD_FROM_SOURCE),
        }
    }
}

fn too_old_message(libname: &str, outdated: &[OutdatedLibrary]) -> String {
    let mut msg = format!("Cannot load {libname} library. Located libraries are too old:");
    for lib in outdated {
        let _ = write!(msg, "\n{} ({})", lib.path.display(), lib.version);
    }
    msg
}

/// Failure to read the version of one candidate library
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Cannot load {}: {message}", .path.display())]
    Load { path: PathBuf, message: String },

    #[error("{} reported an invalid version '{version}'", .path.display())]
    InvalidVersion { path: PathBuf, version: String },

    #[error("Failed to run version probe for {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Version probe for {} exited with {status}", .path.display())]
    ChildFailed { path: PathBuf, status: String },

    #[error("Version probe for {} printed no result", .path.display())]
    NoMarker { path: PathBuf },
}

impl ProbeError {
    /// Whether the failure came from the host loader rather than the file
    /// being absent, and so is worth reporting when nothing else was found
    #[must_use]
    pub fn is_host_runtime(&self) -> bool {
        matches!(self, Self::Load { .. } | Self::Spawn { .. } | Self::ChildFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cause_messages_and_recommendations() {
        assert_eq!(
            LoadCause::DownloadDisabled.to_string(),
            "auto-download is disabled"
        );
        assert!(LoadCause::DownloadDisabled
            .recommendation()
            .unwrap()
            .contains("install ngs and ncbi-vdb manually"));
        assert_eq!(
            LoadCause::ConnectionProblem.recommendation(),
            Some(CHECK_NETWORK)
        );
        assert!(LoadCause::UnsupportedArch
            .recommendation()
            .unwrap()
            .contains("from sources"));
        assert_eq!(LoadCause::NotFound.recommendation(), None);
    }

    #[test]
    fn test_too_old_lists_every_copy() {
        let err = LibraryLoadError::TooOld {
            libname: "widget".to_string(),
            outdated: vec![
                OutdatedLibrary {
                    path: PathBuf::from("/a/libwidget.so"),
                    version: Version::parse("1.5"),
                },
                OutdatedLibrary {
                    path: PathBuf::from("/b/libwidget.so"),
                    version: Version::parse("1.9"),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Cannot load widget library. Located libraries are too old:\n"));
        assert!(msg.contains("/a/libwidget.so (1.5)"));
        assert!(msg.contains("/b/libwidget.so (1.9)"));
        assert_eq!(err.cause(), None);
        assert_eq!(err.libname(), "widget");
    }

    #[test]
    fn test_not_found_exposes_cause() {
        let err = LibraryLoadError::NotFound {
            libname: "ngs-sdk".to_string(),
            cause: LoadCause::UnsupportedArch,
        };
        assert_eq!(err.cause(), Some(&LoadCause::UnsupportedArch));
        assert_eq!(err.recommendation(), LoadCause::UnsupportedArch.recommendation());
        assert!(err.to_string().contains("no build for your OS/version"));
    }

    #[test]
    fn test_probe_error_classification() {
        let path = PathBuf::from("/x");
        assert!(ProbeError::Load {
            path: path.clone(),
            message: "bad ELF".into()
        }
        .is_host_runtime());
        assert!(!ProbeError::NoMarker { path }.is_host_runtime());
    }
}
