use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{c_char, CStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

use libloading::Library;
use tracing::{debug, trace, warn};

use crate::core::version::Version;
use crate::resolver::config::{NCBI_VDB, NGS_SDK};
use crate::resolver::error::ProbeError;

/// Version reported by a library that cannot tell its own version
pub const UNKNOWN_VERSION: &str = "0";

/// Reads the version embedded in a candidate library.
///
/// The resolver only talks to this trait, so a search can run in-process or
/// delegate every load to a child process.
pub trait VersionProbe {
    /// Load `path` just long enough to read its version
    ///
    /// # Errors
    ///
    /// Returns an error if the library cannot be loaded or reports an unusable
    /// version.
    fn probe(&self, libname: &str, path: &Path) -> Result<Version, ProbeError>;

    /// Load `path` for good and return its version
    ///
    /// # Errors
    ///
    /// Same as [`probe`](Self::probe).
    fn confirm(&self, libname: &str, path: &Path) -> Result<Version, ProbeError> {
        self.probe(libname, path)
    }
}

type VersionFn = unsafe extern "C" fn() -> *const c_char;

/// Probes libraries in this process with the platform dynamic loader.
///
/// Each known library exports a function returning its package version as a
/// C string. Libraries passed to [`confirm`](VersionProbe::confirm) stay
/// loaded until the probe is dropped.
pub struct NativeProbe {
    symbols: HashMap<String, String>,
    retained: RefCell<Vec<(PathBuf, Library)>>,
}

impl std::fmt::Debug for NativeProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let retained: Vec<PathBuf> = self.retained.borrow().iter().map(|(p, _)| p.clone()).collect();
        f.debug_struct("NativeProbe")
            .field("symbols", &self.symbols)
            .field("retained", &retained)
            .finish()
    }
}

impl Default for NativeProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeProbe {
    #[must_use]
    pub fn new() -> Self {
        let symbols = [
            (NGS_SDK, "NGS_PackageGetPackageVersion"),
            (NCBI_VDB, "NCBI_VDB_PackageGetPackageVersion"),
        ]
        .into_iter()
        .map(|(lib, sym)| (lib.to_string(), sym.to_string()))
        .collect();

        Self {
            symbols,
            retained: RefCell::new(Vec::new()),
        }
    }

    /// Register the version function of another library
    #[must_use]
    pub fn with_version_symbol(mut self, libname: &str, symbol: &str) -> Self {
        self.symbols.insert(libname.to_string(), symbol.to_string());
        self
    }

    /// Paths of the libraries kept loaded by `confirm`
    #[must_use]
    pub fn retained(&self) -> Vec<PathBuf> {
        self.retained.borrow().iter().map(|(p, _)| p.clone()).collect()
    }

    fn load(&self, libname: &str, path: &Path) -> Result<(Version, Library), ProbeError> {
        trace!("Loading {}...", path.display());
        // SAFETY: loading runs the library's initializers; candidates are
        // libraries of the requested name found in trusted search locations.
        let library = unsafe { Library::new(path) }.map_err(|e| ProbeError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let raw = match self.symbols.get(libname) {
            Some(symbol) => read_version(&library, symbol),
            None => {
                warn!("It is not known how to check the version of {libname} library");
                None
            }
        }
        .unwrap_or_else(|| UNKNOWN_VERSION.to_string());

        let version = Version::parse(&raw);
        if !version.is_valid() {
            return Err(ProbeError::InvalidVersion {
                path: path.to_path_buf(),
                version: raw,
            });
        }
        debug!("{} reports {libname} {version}", path.display());
        Ok((version, library))
    }
}

fn read_version(library: &Library, symbol: &str) -> Option<String> {
    let mut name = symbol.as_bytes().to_vec();
    name.push(0);

    // SAFETY: the registered symbol is a no-argument function returning a
    // static NUL-terminated string or null.
    unsafe {
        let func = match library.get::<VersionFn>(&name) {
            Ok(func) => func,
            Err(e) => {
                trace!("{symbol}: {e}");
                return None;
            }
        };
        let ptr = func();
        if ptr.is_null() {
            return None;
        }
        Some(CStr::from_ptr(ptr).to_string_lossy().trim().to_string())
    }
}

impl VersionProbe for NativeProbe {
    fn probe(&self, libname: &str, path: &Path) -> Result<Version, ProbeError> {
        self.load(libname, path).map(|(version, _)| version)
    }

    fn confirm(&self, libname: &str, path: &Path) -> Result<Version, ProbeError> {
        let (version, library) = self.load(libname, path)?;
        self.retained
            .borrow_mut()
            .push((path.to_path_buf(), library));
        Ok(version)
    }
}

/// Prefix of the line a child probe prints on success
pub const MARKER_PREFIX: &str = "LibManager: libname='";

/// Result line exchanged between the resolver and a child probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeMarker {
    pub libname: String,
    pub filename: String,
    pub version: Option<String>,
}

impl ProbeMarker {
    /// Parse `LibManager: libname='L' filename='P'` with an optional
    /// trailing ` version='V'`
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.trim_end().strip_prefix(MARKER_PREFIX)?;
        let (libname, rest) = rest.split_once("' filename='")?;
        let rest = rest.strip_suffix('\'')?;
        let (filename, version) = match rest.rsplit_once("' version='") {
            Some((filename, version)) => (filename, Some(version.to_string())),
            None => (rest, None),
        };
        Some(Self {
            libname: libname.to_string(),
            filename: filename.to_string(),
            version,
        })
    }
}

impl std::fmt::Display for ProbeMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{MARKER_PREFIX}{}' filename='{}'",
            self.libname, self.filename
        )?;
        if let Some(version) = &self.version {
            write!(f, " version='{version}'")?;
        }
        Ok(())
    }
}

/// Probes each library in a child process.
///
/// Runs `<program> [args...] probe <libname> <path>` and reads the version
/// from the marker line on its stdout, so a broken library can only take
/// down the child.
#[derive(Debug, Clone)]
pub struct SubprocessProbe {
    program: PathBuf,
    args: Vec<OsString>,
}

impl SubprocessProbe {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Arguments placed before the `probe` subcommand
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Re-run the current executable as the child
    ///
    /// # Errors
    ///
    /// Returns an error if the path of the current executable is unknown.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }
}

impl VersionProbe for SubprocessProbe {
    fn probe(&self, libname: &str, path: &Path) -> Result<Version, ProbeError> {
        debug!(
            "Running {} probe {libname} {}",
            self.program.display(),
            path.display()
        );
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("probe")
            .arg(libname)
            .arg(path)
            .output()
            .map_err(|source| ProbeError::Spawn {
                path: path.to_path_buf(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            trace!("child: {line}");
        }

        if !output.status.success() {
            return Err(ProbeError::ChildFailed {
                path: path.to_path_buf(),
                status: output.status.to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let marker = stdout
            .lines()
            .filter_map(ProbeMarker::parse)
            .find(|m| m.libname == libname)
            .ok_or_else(|| ProbeError::NoMarker {
                path: path.to_path_buf(),
            })?;

        let raw = marker.version.unwrap_or_else(|| UNKNOWN_VERSION.to_string());
        let version = Version::parse(&raw);
        if version.is_valid() {
            Ok(version)
        } else {
            Err(ProbeError::InvalidVersion {
                path: path.to_path_buf(),
                version: raw,
            })
        }
    }
}
