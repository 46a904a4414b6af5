use std::io::Write;
use std::time::Duration;

use reqwest::blocking::Client;
use thiserror::Error;

/// Failure to complete an HTTP exchange
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to write response body: {0}")]
    Write(#[from] std::io::Error),
}

/// The HTTP POST primitives the download service needs.
///
/// Implemented by [`HttpTransport`] for real traffic and by in-memory fakes
/// in tests.
pub trait Transport {
    /// POST a form and return the response body of a successful (2xx) reply
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx status.
    fn post_text(&self, url: &str, form: &[(&'static str, String)]) -> Result<String, TransportError>;

    /// POST a form and stream a successful (200) reply body into `sink`.
    ///
    /// Returns the HTTP status code; the body is only written for 200.
    ///
    /// # Errors
    ///
    /// Returns an error when no response was received or the body could not
    /// be written.
    fn post_to(
        &self,
        url: &str,
        form: &[(&'static str, String)],
        sink: &mut dyn Write,
    ) -> Result<u16, TransportError>;
}

/// Default user agent
const USER_AGENT: &str = concat!("lib-solver/", env!("CARGO_PKG_VERSION"));

/// Blocking `reqwest` implementation of [`Transport`]
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpTransport {
    /// Client with the transport's default timeout behavior
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, TransportError> {
        Self::build(None)
    }

    /// Client with an explicit overall request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        Self::build(Some(timeout))
    }

    fn build(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| TransportError::Request {
            url: String::new(),
            message: e.to_string(),
        })?;
        Ok(Self { client, timeout })
    }

    fn send(
        &self,
        url: &str,
        form: &[(&'static str, String)],
    ) -> Result<reqwest::blocking::Response, TransportError> {
        self.client
            .post(url)
            .form(form)
            .send()
            .map_err(|e| TransportError::Request {
                url: url.to_string(),
                message: e.to_string(),
            })
    }
}

impl Transport for HttpTransport {
    fn post_text(&self, url: &str, form: &[(&'static str, String)]) -> Result<String, TransportError> {
        let response = self.send(url, form)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().map_err(|e| TransportError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    fn post_to(
        &self,
        url: &str,
        form: &[(&'static str, String)],
        sink: &mut dyn Write,
    ) -> Result<u16, TransportError> {
        let mut response = self.send(url, form)?;
        let status = response.status().as_u16();
        if status == 200 {
            response
                .copy_to(sink)
                .map_err(|e| TransportError::Request {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            sink.flush()?;
        }
        Ok(status)
    }
}
