use serde::Serialize;
use tracing::{debug, trace};

/// Data model (pointer width) of the running process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Bits {
    B32,
    B64,
    Unknown,
}

impl Bits {
    /// Detect the data model of this build
    #[must_use]
    pub fn detect() -> Self {
        let bits = if cfg!(target_pointer_width = "64") {
            Self::B64
        } else if cfg!(target_pointer_width = "32") {
            Self::B32
        } else {
            Self::Unknown
        };
        trace!("{bits}-bit process");
        bits
    }

    /// Wire and cache-key spelling. Unknown is reported as 64.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::B32 => "32",
            Self::B64 | Self::Unknown => "64",
        }
    }

    /// Suffix appended to library names built for a specific data model
    #[must_use]
    pub fn data_model_suffix(self) -> Option<&'static str> {
        match self {
            Self::B32 => Some("-32"),
            Self::B64 => Some("-64"),
            Self::Unknown => None,
        }
    }
}

impl std::fmt::Display for Bits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::B32 => write!(f, "32"),
            Self::B64 => write!(f, "64"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

pub const OS_LINUX: &str = "Linux";
pub const OS_MACOS: &str = "Mac OS X";
pub const OS_WINDOWS: &str = "Windows";

/// The operating system facts negotiated with the download service and used
/// to build library file names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Platform {
    /// OS name in the spelling the download service expects (e.g. `Linux`, `Mac OS X`)
    pub os_name: Option<String>,
    /// CPU architecture (e.g. `amd64`, `x86_64`, `aarch64`)
    pub os_arch: Option<String>,
    /// OS release, when it can be determined
    pub os_version: Option<String>,
    pub bits: Bits,
}

impl Platform {
    pub fn new(os_name: impl Into<String>, os_arch: impl Into<String>, bits: Bits) -> Self {
        Self {
            os_name: Some(os_name.into()),
            os_arch: Some(os_arch.into()),
            os_version: None,
            bits,
        }
    }

    #[must_use]
    pub fn with_os_version(mut self, version: impl Into<String>) -> Self {
        self.os_version = Some(version.into());
        self
    }

    /// Detect the platform this process runs on
    #[must_use]
    pub fn detect() -> Self {
        let os = std::env::consts::OS;
        let arch = std::env::consts::ARCH;

        let os_name = match os {
            "linux" => Some(OS_LINUX.to_string()),
            "macos" => Some(OS_MACOS.to_string()),
            "windows" => Some(OS_WINDOWS.to_string()),
            "" => None,
            other => Some(other.to_string()),
        };

        let os_arch = match (os, arch) {
            (_, "") => None,
            ("macos", a) => Some(a.to_string()),
            (_, "x86_64") => Some("amd64".to_string()),
            (_, a) => Some(a.to_string()),
        };

        let platform = Self {
            os_name,
            os_arch,
            os_version: detect_os_version(),
            bits: Bits::detect(),
        };
        debug!(
            "Platform: os_name={:?} os_arch={:?} os_version={:?} bits={}",
            platform.os_name, platform.os_arch, platform.os_version, platform.bits
        );
        platform
    }

    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os_name
            .as_deref()
            .is_some_and(|name| name.starts_with("Win"))
    }

    #[must_use]
    pub fn is_macos(&self) -> bool {
        self.os_name.as_deref() == Some(OS_MACOS)
    }

    /// Separator used in path-list environment variables
    #[must_use]
    pub fn path_list_separator(&self) -> char {
        if self.is_windows() {
            ';'
        } else {
            ':'
        }
    }

    /// Platform file name for a library base name (`libfoo.so`, `foo.dll`, `libfoo.dylib`)
    #[must_use]
    pub fn library_file_name(&self, base: &str) -> String {
        if self.is_windows() {
            format!("{base}.dll")
        } else if self.is_macos() {
            format!("lib{base}.dylib")
        } else {
            format!("lib{base}.so")
        }
    }

    /// Library base name with the data model suffix, if the data model is known
    #[must_use]
    pub fn name_with_data_model(&self, libname: &str) -> Option<String> {
        self.bits
            .data_model_suffix()
            .map(|suffix| format!("{libname}{suffix}"))
    }
}

#[cfg(target_os = "linux")]
fn detect_os_version() -> Option<String> {
    std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(not(target_os = "linux"))]
fn detect_os_version() -> Option<String> {
    None
}

/// All file names a library may be installed under, most specific first.
///
/// With `with_data_model` the bit-width variant (`ngs-sdk-64`) comes before the
/// plain name. macOS additionally accepts the names without the `lib` prefix.
///
/// # Examples
///
/// ```
/// use lib_solver::core::platform::{map_library_name, Bits, Platform};
///
/// let linux = Platform::new("Linux", "amd64", Bits::B64);
/// assert_eq!(
///     map_library_name("ngs-sdk", true, &linux),
///     vec!["libngs-sdk-64.so", "libngs-sdk.so"]
/// );
/// ```
#[must_use]
pub fn map_library_name(libname: &str, with_data_model: bool, platform: &Platform) -> Vec<String> {
    let modeled = if with_data_model {
        platform.name_with_data_model(libname)
    } else {
        None
    };

    let mut names = Vec::with_capacity(4);
    if let Some(m) = &modeled {
        names.push(platform.library_file_name(m));
    }
    names.push(platform.library_file_name(libname));

    if platform.is_macos() {
        if let Some(m) = &modeled {
            names.push(format!("{m}.dylib"));
        }
        names.push(format!("{libname}.dylib"));
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_strings() {
        assert_eq!(Bits::B32.as_str(), "32");
        assert_eq!(Bits::B64.as_str(), "64");
        assert_eq!(Bits::Unknown.as_str(), "64");
        assert_eq!(Bits::Unknown.data_model_suffix(), None);
        assert_eq!(Bits::B32.data_model_suffix(), Some("-32"));
    }

    #[test]
    fn test_map_library_name_linux() {
        let p = Platform::new(OS_LINUX, "amd64", Bits::B64);
        assert_eq!(
            map_library_name("ncbi-vdb", true, &p),
            vec!["libncbi-vdb-64.so", "libncbi-vdb.so"]
        );
        assert_eq!(map_library_name("ncbi-vdb", false, &p), vec!["libncbi-vdb.so"]);
    }

    #[test]
    fn test_map_library_name_windows() {
        let p = Platform::new(OS_WINDOWS, "x86", Bits::B32);
        assert_eq!(
            map_library_name("ngs-sdk", true, &p),
            vec!["ngs-sdk-32.dll", "ngs-sdk.dll"]
        );
        assert_eq!(p.path_list_separator(), ';');
    }

    #[test]
    fn test_map_library_name_macos_dual_naming() {
        let p = Platform::new(OS_MACOS, "x86_64", Bits::B64);
        assert_eq!(
            map_library_name("ngs-sdk", true, &p),
            vec![
                "libngs-sdk-64.dylib",
                "libngs-sdk.dylib",
                "ngs-sdk-64.dylib",
                "ngs-sdk.dylib"
            ]
        );
    }

    #[test]
    fn test_unknown_bits_skips_data_model() {
        let p = Platform::new(OS_LINUX, "mips", Bits::Unknown);
        assert_eq!(map_library_name("ngs-sdk", true, &p), vec!["libngs-sdk.so"]);
    }

    #[test]
    fn test_detect_is_consistent() {
        let p = Platform::detect();
        assert_eq!(p.bits, Bits::detect());
        if cfg!(target_os = "linux") {
            assert_eq!(p.os_name.as_deref(), Some(OS_LINUX));
        }
    }
}
