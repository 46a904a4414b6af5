//! The search, download and persist protocol behind every library load.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::cache::store::LibraryCache;
use crate::core::platform::map_library_name;
use crate::core::types::Location;
use crate::core::version::Version;
use crate::remote::manager::DownloadManager;
use crate::remote::request::DownloadResult;
use crate::remote::transport::{HttpTransport, TransportError};
use crate::resolver::config::{LibrarySpec, ResolverConfig};
use crate::resolver::error::{LibraryLoadError, LoadCause, OutdatedLibrary, ProbeError};
use crate::resolver::probe::{NativeProbe, VersionProbe};
use crate::search::context::{absolute_path, SearchContext};
use crate::search::creator::{backup_path, LibraryFileCreator};
use crate::search::iterator::LocationSearchIterator;

/// A library that was found and loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLibrary {
    pub libname: String,
    pub path: PathBuf,
    pub version: Version,
    pub location: Location,
}

#[derive(Debug, Clone)]
struct Candidate {
    path: PathBuf,
    location: Location,
}

/// Bookkeeping of a single resolution
#[derive(Debug)]
struct Attempt<'a> {
    spec: &'a LibrarySpec,
    /// Canonical paths already probed
    probed: HashSet<PathBuf>,
    /// Acceptable candidates of a latest-search, best last
    candidates: BTreeMap<Version, Candidate>,
    outdated: Vec<OutdatedLibrary>,
    download_cause: Option<LoadCause>,
    host_error: Option<String>,
    incompatible: Option<LibraryLoadError>,
}

impl<'a> Attempt<'a> {
    fn new(spec: &'a LibrarySpec) -> Self {
        Self {
            spec,
            probed: HashSet::new(),
            candidates: BTreeMap::new(),
            outdated: Vec::new(),
            download_cause: None,
            host_error: None,
            incompatible: None,
        }
    }

    fn libname(&self) -> &str {
        &self.spec.name
    }

    /// `false` if this file was already probed during the resolution
    fn first_visit(&mut self, path: &Path) -> bool {
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| absolute_path(path));
        if self.probed.insert(key) {
            true
        } else {
            trace!("{} was already checked", path.display());
            false
        }
    }

    fn probe_failed(&mut self, path: &Path, error: &ProbeError) {
        if error.is_host_runtime() {
            warn!("Cannot load library: {error}");
            self.host_error = Some(error.to_string());
        } else {
            debug!("Skipping {}: {error}", path.display());
        }
    }

    fn too_old(&mut self, path: &Path, version: Version) {
        info!(
            "{} {} is older than the required {}",
            path.display(),
            version,
            self.spec.minimum
        );
        let path = path.to_path_buf();
        if !self.outdated.iter().any(|o| o.path == path) {
            self.outdated.push(OutdatedLibrary { path, version });
        }
    }

    fn into_error(self, download_enabled: bool) -> LibraryLoadError {
        if let Some(incompatible) = self.incompatible {
            return incompatible;
        }
        let libname = self.spec.name.clone();
        if !self.outdated.is_empty() {
            return LibraryLoadError::TooOld {
                libname,
                outdated: self.outdated,
            };
        }
        let cause = if let Some(cause) = self.download_cause {
            cause
        } else if !download_enabled {
            LoadCause::DownloadDisabled
        } else if let Some(message) = self.host_error {
            LoadCause::HostRuntime(message)
        } else {
            LoadCause::NotFound
        };
        LibraryLoadError::NotFound { libname, cause }
    }
}

/// Finds, downloads and remembers native libraries.
///
/// Every collaborator is injected, so the whole protocol runs against fake
/// probes and transports in tests. The resolver owns the cache and stores it
/// at the end of every public operation.
pub struct LibraryResolver {
    config: ResolverConfig,
    context: SearchContext,
    cache: LibraryCache,
    probe: Box<dyn VersionProbe>,
    downloads: DownloadManager,
    /// Set when the last resolution asked the service for a download
    download_tried: bool,
}

impl std::fmt::Debug for LibraryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryResolver")
            .field("config", &self.config)
            .field("context", &self.context)
            .field("cache", &self.cache)
            .field("downloads", &self.downloads)
            .finish_non_exhaustive()
    }
}

impl LibraryResolver {
    pub fn new(
        config: ResolverConfig,
        context: SearchContext,
        cache: LibraryCache,
        probe: Box<dyn VersionProbe>,
        downloads: DownloadManager,
    ) -> Self {
        Self {
            config,
            context,
            cache,
            probe,
            downloads,
            download_tried: false,
        }
    }

    /// Resolver for this process: detected platform, cache file in the
    /// installation home, in-process probe and the HTTP download service
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_env(config: ResolverConfig) -> Result<Self, TransportError> {
        let context = SearchContext::from_env(&config);
        let bits = context.platform.bits;
        let cache = match &config.install_home {
            Some(home) => LibraryCache::open(LibraryCache::default_path(home), bits),
            None => {
                warn!("Cannot determine the installation home; library cache is disabled");
                LibraryCache::in_memory(bits)
            }
        };
        let endpoints = DownloadManager::endpoints_from_cache(&cache);
        let downloads = DownloadManager::new(Box::new(HttpTransport::new()?), endpoints);

        Ok(Self::new(
            config,
            context,
            cache,
            Box::new(NativeProbe::new()),
            downloads,
        ))
    }

    /// Replace the version probe
    #[must_use]
    pub fn with_probe(mut self, probe: Box<dyn VersionProbe>) -> Self {
        self.probe = probe;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    #[must_use]
    pub fn context(&self) -> &SearchContext {
        &self.context
    }

    #[must_use]
    pub fn cache(&self) -> &LibraryCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut LibraryCache {
        &mut self.cache
    }

    /// Resolve a library at its declared minimum version.
    ///
    /// # Errors
    ///
    /// Returns an error if no acceptable library was found or downloaded.
    ///
    /// # Panics
    ///
    /// Panics if no minimum version is declared for `libname`; loading an
    /// undeclared library is a programming error.
    pub fn load_library(&mut self, libname: &str) -> Result<ResolvedLibrary, LibraryLoadError> {
        let minimum = self
            .config
            .minimum_version(libname)
            .cloned()
            .unwrap_or_else(|| panic!("No minimum version is declared for {libname} library"));
        self.resolve(&LibrarySpec::new(libname, minimum))
    }

    /// Find, load and remember a library.
    ///
    /// # Errors
    ///
    /// Returns an error if no acceptable library was found or downloaded.
    pub fn resolve(&mut self, spec: &LibrarySpec) -> Result<ResolvedLibrary, LibraryLoadError> {
        debug!("> Loading {} (>= {})...", spec.name, spec.minimum);
        self.download_tried = false;
        let result = if self.config.system_load_only {
            self.system_load(spec)
        } else {
            self.search(spec)
        };

        match &result {
            Ok(found) => info!(
                "Loaded {} {} from {}",
                found.libname,
                found.version,
                found.path.display()
            ),
            Err(e) => warn!("{e}"),
        }

        // a clean cache hit leaves the file untouched
        if !matches!(&result, Ok(found) if found.location == Location::Cache) {
            self.cache.mark_searched(&spec.name, Utc::now());
        }
        self.cache.store();
        result
    }

    fn system_load(&mut self, spec: &LibrarySpec) -> Result<ResolvedLibrary, LibraryLoadError> {
        let mut attempt = Attempt::new(spec);
        let names = map_library_name(&spec.name, false, &self.context.platform);
        let dirs = self.context.directories(Location::LibPath);

        for path in LocationSearchIterator::new(dirs, names) {
            match self.probe.confirm(&spec.name, &path) {
                Ok(version) => {
                    return Ok(ResolvedLibrary {
                        libname: spec.name.clone(),
                        path: absolute_path(&path),
                        version,
                        location: Location::LibPath,
                    });
                }
                Err(e) => attempt.probe_failed(&path, &e),
            }
        }
        Err(attempt.into_error(true))
    }

    fn search(&mut self, spec: &LibrarySpec) -> Result<ResolvedLibrary, LibraryLoadError> {
        let mut attempt = Attempt::new(spec);

        for location in self.config.effective_locations() {
            trace!("Searching {} in {location}", spec.name);
            let found = match location {
                Location::Cache => self.try_cache(&mut attempt),
                Location::Download => {
                    if attempt.candidates.is_empty() {
                        self.try_download(&mut attempt)
                    } else {
                        debug!("Skipping download: an acceptable {} is installed", spec.name);
                        None
                    }
                }
                location if location.is_directory_scan() => self.scan(location, &mut attempt),
                _ => None,
            };
            if let Some(found) = found {
                return Ok(found);
            }
        }

        if let Some(found) = self.confirm_best(&mut attempt) {
            return Ok(found);
        }
        Err(attempt.into_error(self.config.download_enabled))
    }

    fn try_cache(&mut self, attempt: &mut Attempt) -> Option<ResolvedLibrary> {
        let hit = self.cache.get(attempt.libname(), &attempt.spec.minimum)?;
        if !attempt.first_visit(&hit.path) {
            return None;
        }

        let outcome = match self.probe.probe(attempt.libname(), &hit.path) {
            Ok(version) if version >= attempt.spec.minimum => {
                self.accept(attempt, hit.path.clone(), Location::Cache)
            }
            Ok(version) => {
                attempt.too_old(&hit.path, version);
                None
            }
            Err(e) => {
                attempt.probe_failed(&hit.path, &e);
                None
            }
        };
        if outcome.is_none() {
            self.cache.mark_not_loaded(attempt.libname());
        }
        outcome
    }

    /// Load a library whose version already passed the minimum check
    fn accept(
        &mut self,
        attempt: &mut Attempt,
        path: PathBuf,
        location: Location,
    ) -> Option<ResolvedLibrary> {
        match self.probe.confirm(attempt.libname(), &path) {
            Ok(version) => {
                self.cache.mark_loaded(attempt.libname(), &version, &path);
                Some(ResolvedLibrary {
                    libname: attempt.spec.name.clone(),
                    path,
                    version,
                    location,
                })
            }
            Err(e) => {
                attempt.probe_failed(&path, &e);
                None
            }
        }
    }

    fn scan(&mut self, location: Location, attempt: &mut Attempt) -> Option<ResolvedLibrary> {
        let names = map_library_name(attempt.libname(), true, &self.context.platform);
        let dirs = self.context.directories(location);

        for found in LocationSearchIterator::new(dirs, names) {
            if !attempt.first_visit(&found) {
                continue;
            }
            let path = absolute_path(&found);

            match self.probe.probe(attempt.libname(), &path) {
                Ok(version) if version >= attempt.spec.minimum => {
                    debug!("Found {} {version} in {location}", path.display());
                    if !self.config.search_latest {
                        if let Some(found) = self.accept(attempt, path, location) {
                            return Some(found);
                        }
                        continue;
                    }
                    attempt
                        .candidates
                        .entry(version)
                        .or_insert(Candidate { path, location });
                }
                Ok(version) => attempt.too_old(&path, version),
                Err(e) => attempt.probe_failed(&path, &e),
            }
        }
        None
    }

    /// Load the newest recorded candidate, falling back to older ones if the
    /// final load fails
    fn confirm_best(&mut self, attempt: &mut Attempt) -> Option<ResolvedLibrary> {
        while let Some((_, candidate)) = attempt.candidates.pop_last() {
            if let Some(found) = self.accept(attempt, candidate.path, candidate.location) {
                return Some(found);
            }
        }
        None
    }

    fn try_download(&mut self, attempt: &mut Attempt) -> Option<ResolvedLibrary> {
        let libname = attempt.spec.name.clone();
        if let Some(latest) = self.downloads.latest_version(&libname) {
            debug!("Downloading {libname} {latest}...");
        }

        self.download_tried = true;
        let mut creator = LibraryFileCreator::new(&self.context);
        let path = match self
            .downloads
            .download_lib(&mut creator, &libname, &self.context.platform)
        {
            DownloadResult::Success(path) => path,
            DownloadResult::UnsupportedOs => {
                attempt.download_cause = Some(LoadCause::UnsupportedArch);
                return None;
            }
            DownloadResult::Failed => {
                attempt.download_cause = Some(LoadCause::ConnectionProblem);
                return None;
            }
        };
        attempt.first_visit(&path);

        let version = match self.probe.probe(&libname, &path) {
            Ok(version) => version,
            Err(e) => {
                warn!("Downloaded {libname} is not usable: {e}");
                attempt.download_cause = Some(LoadCause::DownloadInvalidLibrary);
                return None;
            }
        };

        if version < attempt.spec.minimum {
            attempt.incompatible = Some(LibraryLoadError::IncompatibleVersion {
                libname,
                path,
                found: version,
                required: attempt.spec.minimum.clone(),
            });
            return None;
        }
        self.cache.mark_saved(&libname, &version, &path);

        match self.probe.confirm(&libname, &path) {
            Ok(version) => {
                self.cache.mark_loaded(&libname, &version, &path);
                Some(ResolvedLibrary {
                    libname,
                    path,
                    version,
                    location: Location::Download,
                })
            }
            Err(e) => {
                warn!("Downloaded {libname} is not usable: {e}");
                attempt.download_cause = Some(LoadCause::DownloadInvalidLibrary);
                None
            }
        }
    }

    /// Compare the local copy of a library with the latest release and
    /// download the release when it is newer.
    ///
    /// `latest` overrides the version reported by the download service.
    /// Returns the best library available afterwards, if any.
    pub fn check_library(&mut self, libname: &str, latest: Option<&str>) -> Option<ResolvedLibrary> {
        debug!("> Checking the version of {libname} library...");

        let latest = match latest.map(str::trim).filter(|l| !l.is_empty()) {
            Some(latest) => {
                self.downloads.set_latest_version(libname, latest);
                Some(latest.to_string())
            }
            None => self.downloads.latest_version(libname),
        };

        let minimum = self
            .config
            .minimum_version(libname)
            .cloned()
            .unwrap_or_else(|| Version::parse("0"));
        let spec = LibrarySpec::new(libname, minimum);

        let local = match self.resolve(&spec) {
            Ok(found) => {
                info!("The current version of {libname} = {}", found.version);
                Some(found)
            }
            Err(e) => {
                debug!("{e}");
                None
            }
        };

        let Some(latest) = latest.map(|l| Version::parse(&l)) else {
            return local;
        };

        if local.as_ref().is_some_and(|l| l.version >= latest) {
            debug!("{libname} is up to date");
            return local;
        }
        if !self.config.download_enabled {
            info!("{libname} {latest} is available but download is disabled");
            return local;
        }
        if self.download_tried {
            debug!("{libname} {latest} was already requested from the download service");
            return local;
        }

        info!("Updating {libname} to {latest}...");
        let mut attempt = Attempt::new(&spec);
        let downloaded = self.try_download(&mut attempt);
        self.cache.store();
        downloaded.or(local)
    }

    /// Remove downloaded copies of a library and forget what the cache knows
    /// about it. Returns the number of files removed.
    pub fn delete_libraries(&mut self, libname: &str) -> usize {
        let mut targets: Vec<PathBuf> = Vec::new();
        if let Some(dir) = self.context.install_lib_dir() {
            for name in map_library_name(libname, true, &self.context.platform) {
                targets.push(dir.join(name));
            }
        }
        if let Some(saved) = self.cache.saved_path(libname) {
            if !targets.contains(&saved) {
                targets.push(saved);
            }
        }
        let backups: Vec<PathBuf> = targets.iter().map(|p| backup_path(p)).collect();
        targets.extend(backups);

        let mut removed = 0;
        for path in targets.iter().filter(|p| p.is_file()) {
            match std::fs::remove_file(path) {
                Ok(()) => {
                    info!("Removed {}", path.display());
                    removed += 1;
                }
                Err(e) => warn!("Cannot remove {}: {e}", path.display()),
            }
        }

        self.cache.forget(libname);
        self.cache.store();
        removed
    }
}
