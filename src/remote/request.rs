use crate::core::platform::Platform;

/// URL-encoded form fields, in order
pub type Form = Vec<(&'static str, String)>;

/// Protocol version sent with library downloads
pub const DOWNLOAD_PROTOCOL_VERSION: &str = "1.0";

/// `cmd=vers`: ask for the latest published version of a library
#[must_use]
pub fn latest_version_form(libname: &str) -> Form {
    vec![("cmd", "vers".to_string()), ("libname", libname.to_string())]
}

/// `cmd=lib`: fetch the library binary for this platform.
///
/// Returns `None` when the OS name is unknown, since the service cannot pick a
/// build without it.
#[must_use]
pub fn download_form(libname: &str, platform: &Platform) -> Option<Form> {
    let os_name = platform.os_name.as_ref()?;

    let mut form = vec![
        ("cmd", "lib".to_string()),
        ("version", DOWNLOAD_PROTOCOL_VERSION.to_string()),
        ("libname", libname.to_string()),
        ("os_name", os_name.clone()),
        ("bits", platform.bits.as_str().to_string()),
    ];
    if let Some(arch) = &platform.os_arch {
        form.push(("os_arch", arch.clone()));
    }
    if let Some(version) = &platform.os_version {
        form.push(("os_version", version.clone()));
    }
    Some(form)
}

/// Outcome of a library download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadResult {
    /// The library was written to this path
    Success(std::path::PathBuf),
    /// Every endpoint failed, or nothing could be requested
    Failed,
    /// The service has no build for this OS/architecture
    UnsupportedOs,
}
