use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::trace;

use crate::core::platform::{Bits, Platform};
use crate::core::types::Location;
use crate::resolver::config::ResolverConfig;

/// Standard library directories searched after the loader path on Unix
const UNIX_SYSTEM_LIB_DIRS: [&str; 5] = ["/usr/local/lib", "/usr/lib64", "/lib64", "/usr/lib", "/lib"];

/// Snapshot of every environment-derived input of a search.
///
/// Built once when the resolver is created, so the per-location strategies
/// below are pure functions of this value.
#[derive(Debug, Clone, Serialize)]
pub struct SearchContext {
    pub platform: Platform,
    /// Installation home (`~/.ncbi`)
    pub install_home: Option<PathBuf>,
    /// Directories of the dynamic loader search path
    pub lib_path: Vec<PathBuf>,
    /// Directory of the running executable
    pub app_dir: Option<PathBuf>,
    /// Directories contributed by `CLASSPATH`
    pub class_path: Vec<PathBuf>,
    pub cwd: Option<PathBuf>,
    pub tmp: PathBuf,
}

impl SearchContext {
    /// Capture the current process environment
    #[must_use]
    pub fn from_env(config: &ResolverConfig) -> Self {
        let platform = Platform::detect();

        let loader_var = if platform.is_windows() {
            "PATH"
        } else if platform.is_macos() {
            "DYLD_LIBRARY_PATH"
        } else {
            "LD_LIBRARY_PATH"
        };
        let mut lib_path = std::env::var(loader_var)
            .map(|v| split_path_list(&v, platform.path_list_separator()))
            .unwrap_or_default();
        if !platform.is_windows() {
            lib_path.extend(UNIX_SYSTEM_LIB_DIRS.iter().map(PathBuf::from));
        }

        let class_path = std::env::var("CLASSPATH")
            .map(|v| class_path_dirs(&v, platform.path_list_separator()))
            .unwrap_or_default();

        let app_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));

        Self {
            install_home: config.install_home.clone(),
            lib_path,
            app_dir,
            class_path,
            cwd: std::env::current_dir().ok(),
            tmp: std::env::temp_dir(),
            platform,
        }
    }

    /// A context with no directories at all; tests fill in what they need
    #[must_use]
    pub fn empty(platform: Platform, tmp: impl Into<PathBuf>) -> Self {
        Self {
            platform,
            install_home: None,
            lib_path: Vec::new(),
            app_dir: None,
            class_path: Vec::new(),
            cwd: None,
            tmp: tmp.into(),
        }
    }

    /// Library directory inside the installation home: `lib64` or `lib32`
    #[must_use]
    pub fn install_lib_dir(&self) -> Option<PathBuf> {
        let sub = match self.platform.bits {
            Bits::B32 => "lib32",
            Bits::B64 | Bits::Unknown => "lib64",
        };
        self.install_home.as_ref().map(|home| home.join(sub))
    }

    /// Directories to scan for a location, in order.
    ///
    /// `Cache` and `Download` are not directory scans and yield nothing.
    #[must_use]
    pub fn directories(&self, location: Location) -> Vec<PathBuf> {
        let dirs = match location {
            Location::Cache | Location::Download => Vec::new(),
            Location::InstallHome => self.install_lib_dir().into_iter().collect(),
            Location::LibPath => self.lib_path.clone(),
            Location::AppDir => self.app_dir.iter().cloned().collect(),
            Location::ClassPath => self.class_path.clone(),
            Location::Cwd => self.cwd.iter().cloned().collect(),
            Location::Tmp => vec![self.tmp.clone()],
        };
        trace!("{location}: {} director(ies)", dirs.len());
        dirs
    }
}

/// Split a path-list string, dropping empty entries
#[must_use]
pub fn split_path_list(value: &str, separator: char) -> Vec<PathBuf> {
    value
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Make a path absolute against the current directory without touching the
/// filesystem; a path that cannot be resolved is returned unchanged
#[must_use]
pub fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
}

/// Class path entries name directories or archives; archives contribute the
/// directory they live in.
fn class_path_dirs(value: &str, separator: char) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for entry in split_path_list(value, separator) {
        let dir = if entry.is_file() {
            entry.parent().map(Path::to_path_buf)
        } else {
            Some(entry)
        };
        if let Some(dir) = dir.filter(|d| !d.as_os_str().is_empty()) {
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::OS_LINUX;

    #[test]
    fn test_split_path_list() {
        assert_eq!(
            split_path_list("/a::/b: ", ':'),
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
        assert_eq!(
            split_path_list("C:\\x;D:\\y", ';'),
            vec![PathBuf::from("C:\\x"), PathBuf::from("D:\\y")]
        );
    }

    #[test]
    fn test_absolute_path() {
        assert_eq!(absolute_path(Path::new("/a/b")), PathBuf::from("/a/b"));
        let rel = absolute_path(Path::new("lib/libx.so"));
        assert!(rel.is_absolute());
        assert!(rel.ends_with("lib/libx.so"));
    }

    #[test]
    fn test_class_path_archives_use_parent_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let jar = dir.path().join("ngs-java.jar");
        std::fs::write(&jar, b"jar").unwrap();
        let other = dir.path().join("classes");

        let value = format!("{}:{}:{}", jar.display(), other.display(), jar.display());
        assert_eq!(
            class_path_dirs(&value, ':'),
            vec![dir.path().to_path_buf(), other]
        );
    }

    #[test]
    fn test_directories_per_location() {
        let platform = Platform::new(OS_LINUX, "amd64", Bits::B64);
        let mut ctx = SearchContext::empty(platform, "/tmp");
        ctx.install_home = Some(PathBuf::from("/home/u/.ncbi"));
        ctx.lib_path = vec![PathBuf::from("/opt/lib")];
        ctx.cwd = Some(PathBuf::from("/work"));

        assert_eq!(
            ctx.directories(Location::InstallHome),
            vec![PathBuf::from("/home/u/.ncbi/lib64")]
        );
        assert_eq!(ctx.directories(Location::LibPath), vec![PathBuf::from("/opt/lib")]);
        assert_eq!(ctx.directories(Location::Cwd), vec![PathBuf::from("/work")]);
        assert_eq!(ctx.directories(Location::Tmp), vec![PathBuf::from("/tmp")]);
        assert!(ctx.directories(Location::AppDir).is_empty());
        assert!(ctx.directories(Location::Cache).is_empty());
        assert!(ctx.directories(Location::Download).is_empty());
    }

    #[test]
    fn test_install_lib_dir_32_bit() {
        let platform = Platform::new(OS_LINUX, "x86", Bits::B32);
        let mut ctx = SearchContext::empty(platform, "/tmp");
        assert_eq!(ctx.install_lib_dir(), None);
        ctx.install_home = Some(PathBuf::from("/h"));
        assert_eq!(ctx.install_lib_dir(), Some(PathBuf::from("/h/lib32")));
    }
}
