//! DTD retrieval.
//!
//! A [`Dtd`] names where the grammar text comes from: inline text, a local
//! file, or an `http://` url fetched with a minimal GET client. Fetched
//! urls are cached in-process; an entry is only stored after the grammar
//! has been validated, so a broken upstream copy is never served from
//! cache.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::dtd::schema::Schema;
use crate::error::{Error, IoError, Result};
use crate::validate;

/// Cache expiry in seconds; caching is disabled when unset.
pub const CACHE_TIMEOUT_ENV: &str = "DTDTREE_CACHE_TIMEOUT";

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REDIRECTS: usize = 5;

struct CacheEntry {
    text: String,
    stored: Instant,
}

static CACHE: Mutex<BTreeMap<String, CacheEntry>> = Mutex::new(BTreeMap::new());

fn cache_timeout() -> Option<Duration> {
    std::env::var(CACHE_TIMEOUT_ENV)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn cache_get(url: &str) -> Option<String> {
    let timeout = cache_timeout()?;
    let mut cache = CACHE.lock();
    match cache.get(url) {
        Some(entry) if entry.stored.elapsed() < timeout => {
            debug!(url, "dtd cache hit");
            Some(entry.text.clone())
        }
        Some(_) => {
            cache.remove(url);
            None
        }
        None => None,
    }
}

fn cache_store(url: &str, text: &str) {
    if cache_timeout().is_none() {
        return;
    }
    CACHE.lock().insert(
        url.to_string(),
        CacheEntry {
            text: text.to_string(),
            stored: Instant::now(),
        },
    );
}

/// Where a DTD comes from.
#[derive(Debug, Clone, Default)]
pub struct Dtd {
    /// `http://` url or filesystem path.
    pub url: Option<String>,
    /// Inline grammar text, takes precedence over `url`.
    pub text: Option<String>,
    /// Directory used to resolve relative paths, usually the directory of
    /// the XML file carrying the DOCTYPE.
    pub base_path: Option<PathBuf>,
}

impl Dtd {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// The raw grammar text, fetched if needed.
    pub fn content(&self) -> Result<String> {
        if let Some(text) = &self.text {
            return Ok(text.clone());
        }
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| Error::config(crate::error::ConfigError::MissingDtd))?;
        if url.starts_with("http://") {
            if let Some(cached) = cache_get(url) {
                return Ok(cached);
            }
            return http_get(url, MAX_REDIRECTS);
        }
        if url.starts_with("https://") {
            return Err(Error::io(IoError::HttpError(format!(
                "https is not supported: {}",
                url
            ))));
        }
        self.read_file(url)
    }

    /// Fetches, validates and compiles the grammar. Remote grammars are
    /// cached only after validation succeeds.
    pub fn schema(&self) -> Result<Rc<Schema>> {
        let content = self.content()?;
        let schema = validate::validate_grammar(&content)?;
        if let Some(url) = self.url.as_deref() {
            if self.text.is_none() && url.starts_with("http://") {
                cache_store(url, &content);
            }
        }
        Ok(schema)
    }

    fn read_file(&self, url: &str) -> Result<String> {
        let path = Path::new(url);
        let resolved: PathBuf = match &self.base_path {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        };
        std::fs::read_to_string(&resolved).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                Error::io(IoError::FileNotFound(resolved.display().to_string()))
            }
            std::io::ErrorKind::PermissionDenied => {
                Error::io(IoError::PermissionDenied(resolved.display().to_string()))
            }
            _ => Error::io(IoError::ReadError(e.to_string())),
        })
    }
}

/// Minimal HTTP GET, enough for `http://host[:port]/path` DTD urls.
fn http_get(url: &str, redirects_left: usize) -> Result<String> {
    let without_scheme = url.strip_prefix("http://").unwrap_or(url);
    let (authority, path) = match without_scheme.find('/') {
        Some(pos) => (&without_scheme[..pos], &without_scheme[pos..]),
        None => (without_scheme, "/"),
    };
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (
            host,
            port.parse::<u16>()
                .map_err(|_| Error::io(IoError::HttpError(format!("bad port in {}", url))))?,
        ),
        None => (authority, 80),
    };

    debug!(host, port, path, "fetching dtd");
    let mut stream = TcpStream::connect((host, port))
        .map_err(|e| Error::io(IoError::HttpError(format!("{}: {}", url, e))))?;
    stream
        .set_read_timeout(Some(FETCH_TIMEOUT))
        .and_then(|()| stream.set_write_timeout(Some(FETCH_TIMEOUT)))
        .map_err(|e| Error::io(IoError::HttpError(e.to_string())))?;

    let request = format!(
        "GET {} HTTP/1.0\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, host
    );
    stream
        .write_all(request.as_bytes())
        .map_err(|e| map_io(url, e))?;

    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .map_err(|e| map_io(url, e))?;
    let response = String::from_utf8_lossy(&response).into_owned();

    let (headers, body) = response
        .split_once("\r\n\r\n")
        .ok_or_else(|| Error::io(IoError::HttpError(format!("bad response from {}", url))))?;
    let status = headers
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| Error::io(IoError::HttpError(format!("bad status line from {}", url))))?;

    match status {
        200 => Ok(body.to_string()),
        301 | 302 | 307 | 308 => {
            if redirects_left == 0 {
                return Err(Error::io(IoError::HttpError(format!(
                    "too many redirects fetching {}",
                    url
                ))));
            }
            let location = headers
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("location")
                        .then(|| value.trim().to_string())
                })
                .ok_or_else(|| {
                    Error::io(IoError::HttpError(format!(
                        "redirect without location from {}",
                        url
                    )))
                })?;
            http_get(&location, redirects_left - 1)
        }
        code => Err(Error::io(IoError::HttpError(format!(
            "{} returned status {}",
            url, code
        )))),
    }
}

fn map_io(url: &str, e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => {
            Error::io(IoError::Timeout(url.to_string()))
        }
        _ => Error::io(IoError::HttpError(format!("{}: {}", url, e))),
    }
}
