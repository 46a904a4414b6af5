use std::path::PathBuf;

use tracing::trace;

use crate::search::context::split_path_list;

/// Lazily yields existing library files: every directory × every file name.
///
/// Directories that do not exist or cannot be read are skipped, never
/// reported. The iterator cannot be rewound; build a new one to search again.
#[derive(Debug, Clone)]
pub struct LocationSearchIterator {
    dirs: Vec<PathBuf>,
    names: Vec<String>,
    dir_index: usize,
    name_index: usize,
}

impl LocationSearchIterator {
    pub fn new(dirs: Vec<PathBuf>, names: Vec<String>) -> Self {
        Self {
            dirs,
            names,
            dir_index: 0,
            name_index: 0,
        }
    }

    /// Search the directories of a path-list string such as `LD_LIBRARY_PATH`
    pub fn from_path_list(value: &str, separator: char, names: Vec<String>) -> Self {
        Self::new(split_path_list(value, separator), names)
    }

    /// The next existing candidate, or `None` when the search is exhausted
    pub fn next_name(&mut self) -> Option<PathBuf> {
        while self.dir_index < self.dirs.len() {
            let dir = &self.dirs[self.dir_index];

            if self.name_index == 0 && !dir.is_dir() {
                trace!("{} is not a readable directory", dir.display());
                self.dir_index += 1;
                continue;
            }

            if self.name_index >= self.names.len() {
                self.dir_index += 1;
                self.name_index = 0;
                continue;
            }

            let candidate = dir.join(&self.names[self.name_index]);
            self.name_index += 1;

            if candidate.is_file() {
                trace!("Found candidate {}", candidate.display());
                return Some(candidate);
            }
            trace!("{} does not exist", candidate.display());
        }
        None
    }
}

impl Iterator for LocationSearchIterator {
    type Item = PathBuf;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_name()
    }
}
