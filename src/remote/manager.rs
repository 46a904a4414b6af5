use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use tracing::{debug, info, trace, warn};

use crate::cache::store::LibraryCache;
use crate::core::platform::Platform;
use crate::remote::request::{download_form, latest_version_form, DownloadResult};
use crate::remote::transport::Transport;

/// Service name of the endpoint override in the cache file
pub const SERVICE_NAME: &str = "sratoolkit";

/// Misspelled service name still found in cache files written by older tools
pub const LEGACY_SERVICE_NAME: &str = "sratookit";

/// Endpoint used when the cache file has no override
pub const DEFAULT_ENDPOINT: &str = "https://trace.ncbi.nlm.nih.gov/Traces/sratoolkit/sratoolkit.cgi";

/// HTTP status the service uses when it has no build for the platform
pub const STATUS_UNSUPPORTED_OS: u16 = 412;

/// A file opened by a [`DownloadSink`] for a download to be written into
pub struct CreatedFile {
    pub path: PathBuf,
    pub writer: Box<dyn Write>,
}

impl std::fmt::Debug for CreatedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatedFile").field("path", &self.path).finish()
    }
}

/// Decides where a downloaded library is written.
///
/// The download manager asks for a file before each attempt and reports the
/// outcome with [`finish`](Self::finish), so the caller keeps control of the
/// final placement.
pub trait DownloadSink {
    /// Open a fresh file for `libname`, or `None` if nowhere is writable
    fn create(&mut self, libname: &str) -> Option<CreatedFile>;

    /// Called once per created file with whether the download succeeded
    fn finish(&mut self, success: bool);
}

/// Talks to the library download service.
///
/// Endpoints are tried in order; a failing endpoint is logged and the next
/// one is used. Latest-version answers are remembered for the lifetime of
/// the manager.
pub struct DownloadManager {
    transport: Box<dyn Transport>,
    endpoints: Vec<String>,
    latest: HashMap<String, String>,
}

impl std::fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadManager")
            .field("endpoints", &self.endpoints)
            .field("latest", &self.latest)
            .finish()
    }
}

impl DownloadManager {
    pub fn new(transport: Box<dyn Transport>, endpoints: Vec<String>) -> Self {
        Self {
            transport,
            endpoints,
            latest: HashMap::new(),
        }
    }

    /// Endpoints to use: the cache-file override if present, else the default
    #[must_use]
    pub fn endpoints_from_cache(cache: &LibraryCache) -> Vec<String> {
        let url = cache
            .server_override(SERVICE_NAME)
            .or_else(|| cache.server_override(LEGACY_SERVICE_NAME));
        match url {
            Some(url) => {
                let origin = cache
                    .path()
                    .map_or_else(|| "the cache".to_string(), |p| p.display().to_string());
                warn!("Use {url} from {origin}");
                vec![url]
            }
            None => vec![DEFAULT_ENDPOINT.to_string()],
        }
    }

    #[must_use]
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Latest published version of a library, or `None` if no endpoint answered.
    ///
    /// Only successful answers are remembered, so a later call retries after a
    /// failure.
    pub fn latest_version(&mut self, libname: &str) -> Option<String> {
        if let Some(latest) = self.latest.get(libname) {
            trace!("Latest version of {libname} already known: {latest}");
            return Some(latest.clone());
        }

        debug!(">> Checking the latest version of {libname} library...");
        let form = latest_version_form(libname);

        for url in &self.endpoints {
            match self.transport.post_text(url, &form) {
                Ok(body) => {
                    let latest = body.trim().to_string();
                    if latest.is_empty() {
                        debug!("{url} returned an empty version for {libname}");
                        continue;
                    }
                    info!("The latest version of {libname} = {latest}");
                    self.latest.insert(libname.to_string(), latest.clone());
                    return Some(latest);
                }
                Err(e) => debug!("{e}"),
            }
        }

        info!("Cannot check the latest version of {libname}");
        None
    }

    /// Record a latest version learned elsewhere (e.g. from the command line)
    pub fn set_latest_version(&mut self, libname: &str, version: &str) {
        self.latest
            .insert(libname.to_string(), version.trim().to_string());
    }

    /// Fetch the library binary for `platform` and write it through `sink`
    pub fn download_lib(
        &self,
        sink: &mut dyn DownloadSink,
        libname: &str,
        platform: &Platform,
    ) -> DownloadResult {
        let Some(form) = download_form(libname, platform) else {
            warn!("Cannot download library: cannot detect OS");
            return DownloadResult::Failed;
        };

        for url in &self.endpoints {
            let Some(CreatedFile { path, mut writer }) = sink.create(libname) else {
                warn!("Cannot download {libname}: no writable location");
                return DownloadResult::Failed;
            };

            let outcome = self.transport.post_to(url, &form, &mut writer);
            drop(writer);

            match outcome {
                Ok(200) => {
                    sink.finish(true);
                    info!("Downloaded {libname} to {}", path.display());
                    return DownloadResult::Success(path);
                }
                Ok(STATUS_UNSUPPORTED_OS) => {
                    sink.finish(false);
                    warn!("Cannot download library: {STATUS_UNSUPPORTED_OS}");
                    return DownloadResult::UnsupportedOs;
                }
                Ok(code) => {
                    sink.finish(false);
                    warn!("Cannot download library: {code}");
                }
                Err(e) => {
                    sink.finish(false);
                    warn!("Cannot download library: {e}");
                }
            }
        }

        DownloadResult::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::Bits;
    use crate::remote::transport::TransportError;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Scripted replies per URL; records every request
    #[derive(Default)]
    struct FakeTransport {
        text: HashMap<String, Result<String, u16>>,
        status: HashMap<String, u16>,
        calls: Rc<RefCell<Vec<(String, String)>>>,
    }

    impl Transport for FakeTransport {
        fn post_text(
            &self,
            url: &str,
            form: &[(&'static str, String)],
        ) -> Result<String, TransportError> {
            self.calls.borrow_mut().push((url.to_string(), form[0].1.clone()));
            match self.text.get(url) {
                Some(Ok(body)) => Ok(body.clone()),
                Some(Err(status)) => Err(TransportError::Status {
                    url: url.to_string(),
                    status: *status,
                }),
                None => Err(TransportError::Request {
                    url: url.to_string(),
                    message: "connection refused".to_string(),
                }),
            }
        }

        fn post_to(
            &self,
            url: &str,
            form: &[(&'static str, String)],
            sink: &mut dyn Write,
        ) -> Result<u16, TransportError> {
            self.calls.borrow_mut().push((url.to_string(), form[0].1.clone()));
            let status = self.status.get(url).copied().unwrap_or(500);
            if status == 200 {
                sink.write_all(b"binary")?;
            }
            Ok(status)
        }
    }

    #[derive(Default)]
    struct MemorySink {
        written: Rc<RefCell<Vec<u8>>>,
        finished: Vec<bool>,
        writable: bool,
    }

    struct SharedWriter(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl DownloadSink for MemorySink {
        fn create(&mut self, libname: &str) -> Option<CreatedFile> {
            if !self.writable {
                return None;
            }
            self.written.borrow_mut().clear();
            Some(CreatedFile {
                path: PathBuf::from(format!("/mem/lib{libname}.so")),
                writer: Box::new(SharedWriter(Rc::clone(&self.written))),
            })
        }

        fn finish(&mut self, success: bool) {
            self.finished.push(success);
        }
    }

    fn platform() -> Platform {
        Platform::new("Linux", "amd64", Bits::B64)
    }

    fn manager(transport: FakeTransport, endpoints: &[&str]) -> DownloadManager {
        DownloadManager::new(
            Box::new(transport),
            endpoints.iter().map(|s| (*s).to_string()).collect(),
        )
    }

    #[test]
    fn test_latest_version_is_trimmed_and_memoized() {
        let mut transport = FakeTransport::default();
        transport.text.insert("http://a".into(), Ok(" 2.10.3\n".into()));
        let calls = Rc::clone(&transport.calls);
        let mut dm = manager(transport, &["http://a"]);

        assert_eq!(dm.latest_version("ngs-sdk").as_deref(), Some("2.10.3"));
        assert_eq!(dm.latest_version("ngs-sdk").as_deref(), Some("2.10.3"));
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn test_latest_version_tries_next_endpoint() {
        let mut transport = FakeTransport::default();
        transport.text.insert("http://a".into(), Err(503));
        transport.text.insert("http://b".into(), Ok("3.0".into()));
        let calls = Rc::clone(&transport.calls);
        let mut dm = manager(transport, &["http://a", "http://b"]);

        assert_eq!(dm.latest_version("ncbi-vdb").as_deref(), Some("3.0"));
        assert_eq!(calls.borrow().len(), 2);
        assert_eq!(calls.borrow()[0].1, "vers");
    }

    #[test]
    fn test_latest_version_exhaustion_is_none_and_not_cached() {
        let transport = FakeTransport::default();
        let calls = Rc::clone(&transport.calls);
        let mut dm = manager(transport, &["http://a"]);

        assert_eq!(dm.latest_version("ngs-sdk"), None);
        assert_eq!(dm.latest_version("ngs-sdk"), None);
        assert_eq!(calls.borrow().len(), 2);
    }

    #[test]
    fn test_set_latest_version_skips_network() {
        let transport = FakeTransport::default();
        let calls = Rc::clone(&transport.calls);
        let mut dm = manager(transport, &["http://a"]);
        dm.set_latest_version("ngs-sdk", "2.9.0 ");

        assert_eq!(dm.latest_version("ngs-sdk").as_deref(), Some("2.9.0"));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_download_success() {
        let mut transport = FakeTransport::default();
        transport.status.insert("http://a".into(), 200);
        let dm = manager(transport, &["http://a"]);
        let mut sink = MemorySink {
            writable: true,
            ..MemorySink::default()
        };

        let result = dm.download_lib(&mut sink, "ngs-sdk", &platform());
        assert_eq!(result, DownloadResult::Success(PathBuf::from("/mem/libngs-sdk.so")));
        assert_eq!(sink.written.borrow().as_slice(), b"binary");
        assert_eq!(sink.finished, vec![true]);
    }

    #[test]
    fn test_download_unsupported_os_stops_immediately() {
        let mut transport = FakeTransport::default();
        transport.status.insert("http://a".into(), 412);
        transport.status.insert("http://b".into(), 200);
        let calls = Rc::clone(&transport.calls);
        let dm = manager(transport, &["http://a", "http://b"]);
        let mut sink = MemorySink {
            writable: true,
            ..MemorySink::default()
        };

        let result = dm.download_lib(&mut sink, "ngs-sdk", &platform());
        assert_eq!(result, DownloadResult::UnsupportedOs);
        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(sink.finished, vec![false]);
    }

    #[test]
    fn test_download_other_status_tries_next_endpoint() {
        let mut transport = FakeTransport::default();
        transport.status.insert("http://a".into(), 500);
        transport.status.insert("http://b".into(), 200);
        let dm = manager(transport, &["http://a", "http://b"]);
        let mut sink = MemorySink {
            writable: true,
            ..MemorySink::default()
        };

        let result = dm.download_lib(&mut sink, "ngs-sdk", &platform());
        assert!(matches!(result, DownloadResult::Success(_)));
        assert_eq!(sink.finished, vec![false, true]);
    }

    #[test]
    fn test_download_without_os_name_fails_without_request() {
        let transport = FakeTransport::default();
        let calls = Rc::clone(&transport.calls);
        let dm = manager(transport, &["http://a"]);
        let mut sink = MemorySink {
            writable: true,
            ..MemorySink::default()
        };
        let mut p = platform();
        p.os_name = None;

        assert_eq!(dm.download_lib(&mut sink, "ngs-sdk", &p), DownloadResult::Failed);
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_download_unwritable_sink_fails() {
        let mut transport = FakeTransport::default();
        transport.status.insert("http://a".into(), 200);
        let dm = manager(transport, &["http://a"]);
        let mut sink = MemorySink::default();

        assert_eq!(
            dm.download_lib(&mut sink, "ngs-sdk", &platform()),
            DownloadResult::Failed
        );
    }

    #[test]
    fn test_endpoints_from_cache() {
        let mut cache = LibraryCache::in_memory(Bits::B64);
        assert_eq!(
            DownloadManager::endpoints_from_cache(&cache),
            vec![DEFAULT_ENDPOINT.to_string()]
        );
        cache.set_server_override(SERVICE_NAME, Some("http://localhost:8080/cgi"));
        assert_eq!(
            DownloadManager::endpoints_from_cache(&cache),
            vec!["http://localhost:8080/cgi".to_string()]
        );
    }

    #[test]
    fn test_endpoints_from_legacy_override() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("LibManager.properties");
        std::fs::write(&path, "/servers/sratookit-cgi=http\\://mirror/cgi\n").unwrap();
        let mut cache = LibraryCache::open(&path, Bits::B64);
        assert_eq!(
            DownloadManager::endpoints_from_cache(&cache),
            vec!["http://mirror/cgi".to_string()]
        );

        // the current spelling wins when both are present
        cache.set_server_override(SERVICE_NAME, Some("http://primary/cgi"));
        assert_eq!(
            DownloadManager::endpoints_from_cache(&cache),
            vec!["http://primary/cgi".to_string()]
        );
    }
}
