//! Byte sources for a markup stream: local files and HTTP(S) responses.
//!
//! [`open_source`] resolves the URL, opens the body and hands back a reader;
//! nothing is buffered here beyond what the transport does.

use core_types::CredentialsMode;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use url::Url;

#[derive(Clone, Debug)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub user_agent: String,
    /// The agent keeps no cookie store, so both modes currently send the
    /// same request; the mode is carried for logging and future use.
    pub credentials: CredentialsMode,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: concat!("streaming-include/", env!("CARGO_PKG_VERSION")).to_string(),
            credentials: CredentialsMode::SameOrigin,
        }
    }
}

#[derive(Debug)]
pub enum NetError {
    InvalidUrl(String),
    UnsupportedScheme(String),
    Io(io::Error),
    /// The server answered with a non-success status.
    Status(u16),
    Transport(String),
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::InvalidUrl(url) => write!(f, "invalid url: {url}"),
            NetError::UnsupportedScheme(scheme) => write!(f, "unsupported scheme: {scheme}"),
            NetError::Io(err) => write!(f, "io error: {err}"),
            NetError::Status(code) => write!(f, "http status {code}"),
            NetError::Transport(err) => write!(f, "transport error: {err}"),
        }
    }
}

impl std::error::Error for NetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NetError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for NetError {
    fn from(err: io::Error) -> Self {
        NetError::Io(err)
    }
}

/// An opened response body.
pub struct Source {
    /// Final URL after redirects.
    pub url: String,
    pub content_type: Option<String>,
    pub body: Box<dyn Read + Send>,
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("url", &self.url)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

pub fn open_source(url: &str, options: &FetchOptions) -> Result<Source, NetError> {
    let parsed = Url::parse(url).map_err(|_| NetError::InvalidUrl(url.to_string()))?;
    match parsed.scheme() {
        "file" => open_file(&parsed),
        "http" | "https" => open_http(&parsed, options),
        other => Err(NetError::UnsupportedScheme(other.to_string())),
    }
}

fn open_file(url: &Url) -> Result<Source, NetError> {
    let path = url
        .to_file_path()
        .map_err(|_| NetError::InvalidUrl(url.to_string()))?;
    let file = File::open(&path)?;
    let content_type = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm") => {
            Some("text/html".to_string())
        }
        Some(ext) if ext.eq_ignore_ascii_case("txt") => Some("text/plain".to_string()),
        _ => None,
    };
    log::debug!(target: "net", "opened {}", path.display());
    Ok(Source {
        url: url.to_string(),
        content_type,
        body: Box::new(file),
    })
}

fn open_http(url: &Url, options: &FetchOptions) -> Result<Source, NetError> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(options.timeout)
        .timeout_read(options.timeout)
        .user_agent(&options.user_agent)
        .tls_config(tls_config()?)
        .build();
    log::debug!(
        target: "net",
        "GET {url} (credentials: {:?})",
        options.credentials
    );
    let response = match agent.request_url("GET", url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(code, _)) => return Err(NetError::Status(code)),
        Err(err) => return Err(NetError::Transport(err.to_string())),
    };
    let final_url = response.get_url().to_string();
    let content_type = response.header("content-type").map(str::to_string);
    Ok(Source {
        url: final_url,
        content_type,
        body: Box::new(response.into_reader()),
    })
}

fn tls_config() -> Result<Arc<rustls::ClientConfig>, NetError> {
    static CONFIG: OnceLock<Arc<rustls::ClientConfig>> = OnceLock::new();
    if let Some(config) = CONFIG.get() {
        return Ok(Arc::clone(config));
    }
    let mut roots = rustls::RootCertStore::empty();
    let loaded = rustls_native_certs::load_native_certs();
    for err in &loaded.errors {
        log::warn!(target: "net", "native certificate error: {err}");
    }
    let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
    log::debug!(target: "net", "loaded {added} native roots ({ignored} ignored)");

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|err| NetError::Transport(err.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::clone(CONFIG.get_or_init(|| Arc::new(config))))
}

/// True for `text/html` content types, parameters ignored.
pub fn is_html(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("text/html"))
}
