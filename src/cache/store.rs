use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::cache::properties;
use crate::core::platform::Bits;
use crate::core::types::CacheSlot;
use crate::core::version::Version;

/// Name of the cache file inside the installation home
pub const CACHE_FILE_NAME: &str = "LibManager.properties";

const DLL_ROOT: &str = "/dll";
const SERVERS_ROOT: &str = "/servers";

/// Fields stored for each slot of a library record
#[derive(Debug, Clone, Copy)]
enum Field {
    Path,
    Version,
}

impl Field {
    fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Version => "version",
        }
    }
}

/// A library path and version found in the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedLibrary {
    pub path: PathBuf,
    pub version: Version,
    pub slot: CacheSlot,
}

/// Path and version recorded in one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotRecord {
    pub path: Option<PathBuf>,
    pub version: Option<Version>,
}

/// Everything the cache knows about one library at the current bit width
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryRecord {
    pub libname: String,
    pub bits: String,
    pub loaded: SlotRecord,
    pub saved: SlotRecord,
    pub last_search: Option<String>,
}

/// Durable record of where libraries were found or downloaded.
///
/// Entries are keyed by library name and bit width. Mutations only touch the
/// in-memory map and set a dirty flag; nothing reaches the disk until
/// [`LibraryCache::store`] is called, and then only if something changed.
#[derive(Debug)]
pub struct LibraryCache {
    /// Backing file, `None` for an in-memory cache
    path: Option<PathBuf>,
    bits: Bits,
    entries: BTreeMap<String, String>,
    dirty: bool,
}

impl LibraryCache {
    /// Create an empty cache that is never written to disk
    #[must_use]
    pub fn in_memory(bits: Bits) -> Self {
        Self {
            path: None,
            bits,
            entries: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Load the cache from a file.
    ///
    /// A missing or unreadable file gives an empty cache that will be created
    /// on the first [`store`](Self::store).
    #[must_use]
    pub fn open(path: impl Into<PathBuf>, bits: Bits) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => {
                let entries = properties::parse(&text);
                debug!("Loaded {} cache entries from {}", entries.len(), path.display());
                entries
            }
            Err(e) => {
                trace!("Cannot read {}: {e}", path.display());
                BTreeMap::new()
            }
        };

        Self {
            path: Some(path),
            bits,
            entries,
            dirty: false,
        }
    }

    /// Cache file location inside an installation home directory
    #[must_use]
    pub fn default_path(home: &Path) -> PathBuf {
        home.join(CACHE_FILE_NAME)
    }

    /// Backing file, if any
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn bits(&self) -> Bits {
        self.bits
    }

    /// Whether there are changes not yet written by [`store`](Self::store)
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn record_root(&self, libname: &str) -> String {
        format!("{DLL_ROOT}/{libname}/{}/", self.bits.as_str())
    }

    fn key(&self, libname: &str, slot: CacheSlot, field: Field) -> String {
        format!(
            "{}{}/{}",
            self.record_root(libname),
            slot.as_str(),
            field.as_str()
        )
    }

    fn last_search_key(&self, libname: &str) -> String {
        format!("{}last-search", self.record_root(libname))
    }

    fn set(&mut self, key: String, value: String) {
        if self.entries.get(&key) == Some(&value) {
            return;
        }
        self.entries.insert(key, value);
        self.dirty = true;
    }

    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.dirty = true;
        }
    }

    fn clear_slot(&mut self, libname: &str, slot: CacheSlot) {
        self.remove(&self.key(libname, slot, Field::Path));
        self.remove(&self.key(libname, slot, Field::Version));
    }

    /// Recorded path of a slot, without validation
    #[must_use]
    pub fn slot_path(&self, libname: &str, slot: CacheSlot) -> Option<PathBuf> {
        self.entries
            .get(&self.key(libname, slot, Field::Path))
            .map(PathBuf::from)
    }

    /// Recorded version of a slot, without validation
    #[must_use]
    pub fn slot_version(&self, libname: &str, slot: CacheSlot) -> Option<Version> {
        self.entries
            .get(&self.key(libname, slot, Field::Version))
            .map(|v| Version::parse(v))
    }

    #[must_use]
    pub fn loaded_path(&self, libname: &str) -> Option<PathBuf> {
        self.slot_path(libname, CacheSlot::Loaded)
    }

    #[must_use]
    pub fn loaded_version(&self, libname: &str) -> Option<Version> {
        self.slot_version(libname, CacheSlot::Loaded)
    }

    #[must_use]
    pub fn saved_path(&self, libname: &str) -> Option<PathBuf> {
        self.slot_path(libname, CacheSlot::Saved)
    }

    #[must_use]
    pub fn saved_version(&self, libname: &str) -> Option<Version> {
        self.slot_version(libname, CacheSlot::Saved)
    }

    /// When the library was last searched for
    #[must_use]
    pub fn last_search(&self, libname: &str) -> Option<DateTime<Utc>> {
        self.entries
            .get(&self.last_search_key(libname))
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Find a usable cached library: the loaded slot first, then the saved one.
    ///
    /// Slots that are incomplete, point at a file that no longer exists, or
    /// record a version below `minimal_version` are purged and the cache is
    /// marked dirty.
    pub fn get(&mut self, libname: &str, minimal_version: &Version) -> Option<CachedLibrary> {
        [CacheSlot::Loaded, CacheSlot::Saved]
            .into_iter()
            .find_map(|slot| self.get_slot(libname, slot, minimal_version))
    }

    fn get_slot(
        &mut self,
        libname: &str,
        slot: CacheSlot,
        minimal_version: &Version,
    ) -> Option<CachedLibrary> {
        let version = self.slot_version(libname, slot);
        let path = self.slot_path(libname, slot);

        let (path, version) = match (path, version) {
            (None, None) => return None,
            (Some(path), Some(version)) => (path, version),
            _ => {
                debug!("Purging incomplete {slot} cache entry for {libname}");
                self.clear_slot(libname, slot);
                return None;
            }
        };

        if !path.is_file() {
            debug!(
                "Purging {slot} cache entry for {libname}: {} no longer exists",
                path.display()
            );
            self.clear_slot(libname, slot);
            return None;
        }

        if version < *minimal_version {
            debug!(
                "Purging {slot} cache entry for {libname}: version {version} is older than {minimal_version}"
            );
            self.clear_slot(libname, slot);
            return None;
        }

        debug!("The version of the most recently {slot} {libname} = {version}");
        Some(CachedLibrary {
            path,
            version,
            slot,
        })
    }

    /// Record the library that was loaded successfully
    pub fn mark_loaded(&mut self, libname: &str, version: &Version, path: &Path) {
        self.mark(libname, CacheSlot::Loaded, version, path);
    }

    /// Record the library that was downloaded
    pub fn mark_saved(&mut self, libname: &str, version: &Version, path: &Path) {
        self.mark(libname, CacheSlot::Saved, version, path);
    }

    fn mark(&mut self, libname: &str, slot: CacheSlot, version: &Version, path: &Path) {
        let path_key = self.key(libname, slot, Field::Path);
        let version_key = self.key(libname, slot, Field::Version);
        self.set(path_key, path.to_string_lossy().into_owned());
        self.set(version_key, version.as_str().to_string());
    }

    /// Forget the loaded library, e.g. after a cache hit failed to load
    pub fn mark_not_loaded(&mut self, libname: &str) {
        self.clear_slot(libname, CacheSlot::Loaded);
    }

    /// Record when the library was last searched for
    pub fn mark_searched(&mut self, libname: &str, at: DateTime<Utc>) {
        let key = self.last_search_key(libname);
        self.set(key, at.to_rfc3339());
    }

    /// Remove everything recorded about a library at this bit width
    pub fn forget(&mut self, libname: &str) {
        let root = self.record_root(libname);
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(&root));
        if self.entries.len() != before {
            self.dirty = true;
        }
    }

    /// Endpoint override stored under `/servers/<service>-cgi`
    #[must_use]
    pub fn server_override(&self, service: &str) -> Option<String> {
        self.entries
            .get(&format!("{SERVERS_ROOT}/{service}-cgi"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Set or clear an endpoint override
    pub fn set_server_override(&mut self, service: &str, url: Option<&str>) {
        let key = format!("{SERVERS_ROOT}/{service}-cgi");
        match url {
            Some(url) => self.set(key, url.to_string()),
            None => self.remove(&key),
        }
    }

    /// Library names with at least one entry at this bit width
    #[must_use]
    pub fn libraries(&self) -> Vec<String> {
        let bits = self.bits.as_str();
        let mut names: Vec<String> = self
            .entries
            .keys()
            .filter_map(|key| {
                let rest = key.strip_prefix(DLL_ROOT)?.strip_prefix('/')?;
                let (libname, rest) = rest.split_once('/')?;
                let (key_bits, _) = rest.split_once('/').unwrap_or((rest, ""));
                (key_bits == bits).then(|| libname.to_string())
            })
            .collect();
        names.dedup();
        names
    }

    /// Structured view of every library record at this bit width
    #[must_use]
    pub fn records(&self) -> Vec<LibraryRecord> {
        self.libraries()
            .into_iter()
            .map(|libname| LibraryRecord {
                loaded: SlotRecord {
                    path: self.loaded_path(&libname),
                    version: self.loaded_version(&libname),
                },
                saved: SlotRecord {
                    path: self.saved_path(&libname),
                    version: self.saved_version(&libname),
                },
                last_search: self
                    .entries
                    .get(&self.last_search_key(&libname))
                    .cloned(),
                bits: self.bits.as_str().to_string(),
                libname,
            })
            .collect()
    }

    /// Write the cache to disk if it changed.
    ///
    /// Returns `true` when the file was written. Failures are logged and leave
    /// the cache dirty; they never propagate, since not being able to remember
    /// a library must not stop it from being used.
    pub fn store(&mut self) -> bool {
        if !self.dirty {
            return false;
        }

        let Some(path) = self.path.clone() else {
            trace!("In-memory cache, nothing to store");
            return false;
        };

        match self.write_to(&path) {
            Ok(()) => {
                debug!("Stored cache to {}", path.display());
                self.dirty = false;
                true
            }
            Err(e) => {
                warn!("Cannot store cache to {}: {e}", path.display());
                false
            }
        }
    }

    fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "cannot find parent directory to store the cache",
                )
            })?;

        if !parent.exists() {
            create_private_dir(parent)?;
        }

        let text = properties::render(&self.entries, &Utc::now().to_rfc2822());
        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(text.as_bytes())?;
        temp.flush()?;
        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Create a directory readable, writable and searchable by its owner only
pub fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}
