use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::core::types::Location;
use crate::core::version::Version;

/// Disable the smart search and only do a plain system load
pub const ENV_SYSTEM_LOAD: &str = "VDB_SYSTEM_LOAD_LIBRARY";
/// Disable downloading libraries from NCBI
pub const ENV_DISABLE_DOWNLOAD: &str = "VDB_DISABLE_DOWNLOAD";
/// Stop at the first acceptable library instead of looking for the newest one
pub const ENV_DISABLE_LATEST_SEARCH: &str = "VDB_DISABLE_LATEST_SEARCH";
/// Location override string, e.g. `KNLD`
pub const ENV_LOCATIONS: &str = "VDB_LOAD_LIBRARY_LOCATIONS";
/// Installation home directory, `~/.ncbi` by default
pub const ENV_HOME: &str = "NCBI_HOME";
/// Log filter directive
pub const ENV_LOG: &str = "VDB_LOG";

/// Installation home directory name under the user's home
pub const DEFAULT_HOME_DIR: &str = ".ncbi";

pub const NGS_SDK: &str = "ngs-sdk";
pub const NCBI_VDB: &str = "ncbi-vdb";

/// Minimum versions of the libraries this crate knows how to bootstrap
pub const DEFAULT_MINIMUM_VERSIONS: [(&str, &str); 2] = [(NGS_SDK, "1.3.0"), (NCBI_VDB, "2.8.0")];

/// A library to resolve and the lowest version the caller accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibrarySpec {
    pub name: String,
    pub minimum: Version,
}

impl LibrarySpec {
    pub fn new(name: impl Into<String>, minimum: impl Into<Version>) -> Self {
        Self {
            name: name.into(),
            minimum: minimum.into(),
        }
    }
}

/// Behavior switches for the resolver.
///
/// Built once, before the resolver, and never re-read from the environment
/// afterwards.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Only try a plain system load of the undecorated library name
    pub system_load_only: bool,
    /// Allow fetching the library from the download service
    pub download_enabled: bool,
    /// Keep scanning after the first acceptable library and load the newest one
    pub search_latest: bool,
    /// Locations to search, in priority order
    pub locations: Vec<Location>,
    /// Installation home, `None` when no home directory can be determined
    pub install_home: Option<PathBuf>,
    /// Declared minimum versions by library name
    pub minimum_versions: BTreeMap<String, Version>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            system_load_only: false,
            download_enabled: true,
            search_latest: true,
            locations: Location::ALL.to_vec(),
            install_home: dirs::home_dir().map(|home| home.join(DEFAULT_HOME_DIR)),
            minimum_versions: DEFAULT_MINIMUM_VERSIONS
                .iter()
                .map(|(name, version)| ((*name).to_string(), Version::parse(version)))
                .collect(),
        }
    }
}

impl ResolverConfig {
    /// Defaults overridden by the `VDB_*` and `NCBI_HOME` environment variables
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if lookup(ENV_SYSTEM_LOAD).is_some_and(|v| is_truthy(&v)) {
            warn!("Smart library search was disabled");
            config.system_load_only = true;
        }
        if lookup(ENV_DISABLE_DOWNLOAD).is_some_and(|v| is_truthy(&v)) {
            debug!("Library download was disabled");
            config.download_enabled = false;
        }
        if lookup(ENV_DISABLE_LATEST_SEARCH).is_some_and(|v| is_truthy(&v)) {
            debug!("Search for the latest installed library was disabled");
            config.search_latest = false;
        }
        if let Some(codes) = lookup(ENV_LOCATIONS) {
            match Location::parse_codes(&codes) {
                Some(locations) => config.locations = locations,
                None => warn!("Ignoring {ENV_LOCATIONS}='{codes}': no known location codes"),
            }
        }
        if let Some(home) = lookup(ENV_HOME).filter(|h| !h.trim().is_empty()) {
            config.install_home = Some(PathBuf::from(home));
        }

        config
    }

    #[must_use]
    pub fn with_system_load_only(mut self, yes: bool) -> Self {
        self.system_load_only = yes;
        self
    }

    #[must_use]
    pub fn with_download(mut self, enabled: bool) -> Self {
        self.download_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_search_latest(mut self, enabled: bool) -> Self {
        self.search_latest = enabled;
        self
    }

    #[must_use]
    pub fn with_locations(mut self, locations: Vec<Location>) -> Self {
        self.locations = locations;
        self
    }

    #[must_use]
    pub fn with_install_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.install_home = Some(home.into());
        self
    }

    #[must_use]
    pub fn with_minimum_version(mut self, libname: &str, minimum: impl Into<Version>) -> Self {
        self.minimum_versions
            .insert(libname.to_string(), minimum.into());
        self
    }

    /// Declared minimum version of a library
    #[must_use]
    pub fn minimum_version(&self, libname: &str) -> Option<&Version> {
        self.minimum_versions.get(libname)
    }

    /// Locations the resolver will actually visit, with disabled ones removed
    #[must_use]
    pub fn effective_locations(&self) -> Vec<Location> {
        if self.system_load_only {
            return vec![Location::LibPath];
        }
        self.locations
            .iter()
            .copied()
            .filter(|l| *l != Location::Download || self.download_enabled)
            .collect()
    }
}

/// Environment flags are on unless empty or an explicit negative
fn is_truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::from_lookup(|_| None);
        assert!(!config.system_load_only);
        assert!(config.download_enabled);
        assert!(config.search_latest);
        assert_eq!(config.locations, Location::ALL.to_vec());
        assert_eq!(
            config.minimum_version(NGS_SDK),
            Some(&Version::parse("1.3.0"))
        );
        assert_eq!(config.minimum_version("widget"), None);
    }

    #[test]
    fn test_env_overrides() {
        let config = ResolverConfig::from_lookup(lookup_from(&[
            (ENV_DISABLE_DOWNLOAD, "1"),
            (ENV_DISABLE_LATEST_SEARCH, "yes"),
            (ENV_LOCATIONS, "WK"),
            (ENV_HOME, "/srv/ncbi"),
        ]));
        assert!(!config.download_enabled);
        assert!(!config.search_latest);
        assert_eq!(config.locations, vec![Location::Cwd, Location::Cache]);
        assert_eq!(config.install_home, Some(PathBuf::from("/srv/ncbi")));
    }

    #[test]
    fn test_falsey_values_leave_defaults() {
        let config = ResolverConfig::from_lookup(lookup_from(&[
            (ENV_DISABLE_DOWNLOAD, "false"),
            (ENV_SYSTEM_LOAD, "0"),
            (ENV_LOCATIONS, "???"),
        ]));
        assert!(config.download_enabled);
        assert!(!config.system_load_only);
        assert_eq!(config.locations, Location::ALL.to_vec());
    }

    #[test]
    fn test_effective_locations() {
        let config = ResolverConfig::default().with_download(false);
        assert!(!config.effective_locations().contains(&Location::Download));

        let config = ResolverConfig::default().with_system_load_only(true);
        assert_eq!(config.effective_locations(), vec![Location::LibPath]);
    }
}
