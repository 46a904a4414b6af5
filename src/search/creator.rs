use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::cache::store::create_private_dir;
use crate::core::platform::{map_library_name, Platform};
use crate::remote::manager::{CreatedFile, DownloadSink};
use crate::search::context::{absolute_path, SearchContext};

/// Suffix given to a previous copy of a library that is about to be replaced
pub const BACKUP_SUFFIX: &str = ".bak";

const WRITE_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug)]
struct Pending {
    path: PathBuf,
    backup: Option<PathBuf>,
}

/// Creates the files downloaded libraries are written to.
///
/// Tries the installation-home library directory first, then the temporary
/// directory. An existing library at the target is renamed to `<name>.bak`
/// and restored if the download fails.
#[derive(Debug)]
pub struct LibraryFileCreator {
    dirs: Vec<PathBuf>,
    platform: Platform,
    pending: Option<Pending>,
    /// Every file successfully created, oldest first
    created: Vec<PathBuf>,
}

impl LibraryFileCreator {
    #[must_use]
    pub fn new(context: &SearchContext) -> Self {
        let mut dirs: Vec<PathBuf> = context.install_lib_dir().into_iter().collect();
        dirs.push(context.tmp.clone());
        Self::with_dirs(dirs, context.platform.clone())
    }

    #[must_use]
    pub fn with_dirs(dirs: Vec<PathBuf>, platform: Platform) -> Self {
        Self {
            dirs,
            platform,
            pending: None,
            created: Vec::new(),
        }
    }

    /// Files created by this creator whose downloads succeeded
    #[must_use]
    pub fn created(&self) -> &[PathBuf] {
        &self.created
    }

    fn open(&self, dir: &Path, file_name: &str) -> Option<(File, Pending)> {
        if !dir.is_dir() {
            if let Err(e) = create_private_dir(dir) {
                warn!("Cannot create {}: {e}", dir.display());
                return None;
            }
        }

        let path = absolute_path(&dir.join(file_name));
        debug!("Trying to create {}...", path.display());

        let backup = if path.exists() {
            let backup = backup_path(&path);
            // Windows cannot rename onto an existing file
            if self.platform.is_windows() && backup.exists() {
                trace!("Trying to remove {} ...", backup.display());
                if let Err(e) = std::fs::remove_file(&backup) {
                    warn!("Cannot remove {}: {e}", backup.display());
                }
            }
            trace!("Trying to rename {} to {} ...", path.display(), backup.display());
            match std::fs::rename(&path, &backup) {
                Ok(()) => Some(backup),
                Err(e) => {
                    warn!("Renaming {} to {} failed: {e}", path.display(), backup.display());
                    None
                }
            }
        } else {
            None
        };

        match File::create(&path) {
            Ok(file) => {
                debug!("Opened {}", path.display());
                Some((file, Pending { path, backup }))
            }
            Err(e) => {
                warn!("Cannot open {}: {e}", path.display());
                if let Some(backup) = &backup {
                    restore_backup(backup, &path);
                }
                None
            }
        }
    }
}

impl DownloadSink for LibraryFileCreator {
    fn create(&mut self, libname: &str) -> Option<CreatedFile> {
        self.finish(false);

        let names = map_library_name(libname, false, &self.platform);
        let file_name = names.first()?;

        for dir in &self.dirs {
            if let Some((file, pending)) = self.open(dir, file_name) {
                let path = pending.path.clone();
                self.pending = Some(pending);
                return Some(CreatedFile {
                    path,
                    writer: Box::new(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file)),
                });
            }
        }
        None
    }

    fn finish(&mut self, success: bool) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        if success {
            self.created.push(pending.path);
            return;
        }

        debug!("Discarding incomplete {}", pending.path.display());
        if let Err(e) = std::fs::remove_file(&pending.path) {
            trace!("Cannot remove {}: {e}", pending.path.display());
        }
        if let Some(backup) = &pending.backup {
            restore_backup(backup, &pending.path);
        }
    }
}

/// `<path>.bak`
#[must_use]
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

fn restore_backup(backup: &Path, path: &Path) {
    if let Err(e) = std::fs::rename(backup, path) {
        warn!("Cannot restore {} from {}: {e}", path.display(), backup.display());
    }
}
