use serde::{Deserialize, Serialize};

/// A category of places to look for a library.
///
/// The declaration order is the search priority: the resolver walks locations
/// from first to last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// Path recorded in the persistent cache by a previous run
    Cache,
    /// `~/.ncbi/lib64` (or `lib32`), where downloads are saved
    InstallHome,
    /// The dynamic loader search path plus the standard system library directories
    LibPath,
    /// Directory containing the running executable
    AppDir,
    /// Directories named by `CLASSPATH`
    ClassPath,
    /// Current working directory
    Cwd,
    /// Temporary directory
    Tmp,
    /// Fetch the library from the download service
    Download,
}

impl Location {
    /// Every location in priority order
    pub const ALL: [Location; 8] = [
        Self::Cache,
        Self::InstallHome,
        Self::LibPath,
        Self::AppDir,
        Self::ClassPath,
        Self::Cwd,
        Self::Tmp,
        Self::Download,
    ];

    /// Single-letter code used by the location override string
    #[must_use]
    pub fn code(self) -> char {
        match self {
            Self::Cache => 'K',
            Self::InstallHome => 'N',
            Self::LibPath => 'L',
            Self::AppDir => 'J',
            Self::ClassPath => 'C',
            Self::Cwd => 'W',
            Self::Tmp => 'T',
            Self::Download => 'D',
        }
    }

    #[must_use]
    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.code() == code)
    }

    /// Parse a location override string such as `"KNLD"`.
    ///
    /// Unknown characters are ignored and repeated locations keep their first
    /// position. Returns `None` when no valid code is present, meaning the
    /// default order should be used.
    ///
    /// ```
    /// use lib_solver::core::types::Location;
    ///
    /// assert_eq!(
    ///     Location::parse_codes("W?K"),
    ///     Some(vec![Location::Cwd, Location::Cache])
    /// );
    /// assert_eq!(Location::parse_codes("xyz"), None);
    /// ```
    #[must_use]
    pub fn parse_codes(codes: &str) -> Option<Vec<Self>> {
        let mut locations = Vec::new();
        for location in codes.chars().filter_map(Self::from_code) {
            if !locations.contains(&location) {
                locations.push(location);
            }
        }

        if locations.is_empty() {
            None
        } else {
            Some(locations)
        }
    }

    /// Locations whose candidates come from scanning directories
    #[must_use]
    pub fn is_directory_scan(self) -> bool {
        !matches!(self, Self::Cache | Self::Download)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::InstallHome => write!(f, "install home"),
            Self::LibPath => write!(f, "library path"),
            Self::AppDir => write!(f, "application directory"),
            Self::ClassPath => write!(f, "class path"),
            Self::Cwd => write!(f, "working directory"),
            Self::Tmp => write!(f, "temporary directory"),
            Self::Download => write!(f, "download"),
        }
    }
}

/// Which record of a library the cache is talking about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSlot {
    /// The library that was last loaded successfully
    Loaded,
    /// The library that was last downloaded
    Saved,
}

impl CacheSlot {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Saved => "saved",
        }
    }
}

impl std::fmt::Display for CacheSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
