//! Resolution of script references into line streams.
//!
//! A reference is either a local path or a plain `http://` URL. Remote scripts are
//! fetched with a single hand-written request over a TCP stream; the response
//! headers are skipped and the body is handed back as the script.

use crate::error::ScriptError;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};

/// The only prefix that marks a reference as remote.
pub const REMOTE_PREFIX: &str = "http://";

/// Port used when a URL does not name one.
pub const DEFAULT_PORT: &str = "80";

/// Where the lines of a nested script come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptRef {
    Local(PathBuf),
    Remote(String),
}

impl ScriptRef {
    /// Classify a reference. Only the literal `http://` prefix makes it remote;
    /// anything else, typos included, is a local path.
    pub fn parse(reference: &str) -> Self {
        if reference.starts_with(REMOTE_PREFIX) {
            ScriptRef::Remote(reference.to_string())
        } else {
            ScriptRef::Local(PathBuf::from(reference))
        }
    }
}

/// A URL broken down into the pieces needed to issue a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    pub host: String,
    pub port: String,
    pub path: String,
}

/// Break a URL into host, port and path.
///
/// The host starts right after the first `//` and ends at the first `/` (start of
/// the path) or at a `:` that comes before it (start of an explicit port). The port
/// defaults to `80`. A URL without `//`, or without a `/` after the host, is rejected.
///
/// ```
/// use script_shell::script::resolve_url;
/// let parts = resolve_url("http://localhost:8080/a/b.txt").unwrap();
/// assert_eq!((parts.host.as_str(), parts.port.as_str(), parts.path.as_str()),
///            ("localhost", "8080", "/a/b.txt"));
/// ```
pub fn resolve_url(url: &str) -> Result<UrlParts, ScriptError> {
    let host_start = url
        .find("//")
        .map(|pos| pos + 2)
        .ok_or_else(|| ScriptError::MalformedUrl {
            url: url.to_string(),
        })?;
    let path_start = url[host_start..]
        .find('/')
        .map(|pos| host_start + pos)
        .ok_or_else(|| ScriptError::MissingPath {
            url: url.to_string(),
        })?;

    let authority = &url[host_start..path_start];
    let (host, port) = match authority.split_once(':') {
        Some((host, port)) => (host, port),
        None => (authority, DEFAULT_PORT),
    };

    Ok(UrlParts {
        host: host.to_string(),
        port: port.to_string(),
        path: url[path_start..].to_string(),
    })
}

/// Fetch a remote script and return a stream positioned at the start of the body.
pub fn open_remote(url: &str) -> Result<Box<dyn BufRead>, ScriptError> {
    let parts = resolve_url(url)?;
    let port: u16 = parts.port.parse().map_err(|_| ScriptError::InvalidPort {
        url: url.to_string(),
        port: parts.port.clone(),
    })?;

    tracing::debug!(host = %parts.host, port, path = %parts.path, "fetching remote script");
    let mut stream =
        TcpStream::connect((parts.host.as_str(), port)).map_err(|source| ScriptError::Connect {
            host: parts.host.clone(),
            port: parts.port.clone(),
            source,
        })?;

    let transport = |source: io::Error| ScriptError::Transport {
        host: parts.host.clone(),
        source,
    };

    write!(
        stream,
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: Close\r\n\r\n",
        parts.path, parts.host
    )
    .and_then(|_| stream.flush())
    .map_err(transport)?;

    let mut reader = BufReader::new(stream);
    skip_headers(&mut reader).map_err(transport)?;
    Ok(Box::new(reader))
}

/// Consume the status line and header lines up to and including the first blank line.
fn skip_headers(reader: &mut dyn BufRead) -> io::Result<()> {
    let mut first = true;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            return Ok(());
        }
        let header = header.trim_end_matches(['\r', '\n']);
        if first {
            log_status_line(header);
            first = false;
        }
        if header.is_empty() {
            return Ok(());
        }
    }
}

fn log_status_line(status_line: &str) {
    tracing::debug!(status_line, "remote script response");
    let code = status_line.split_whitespace().nth(1);
    if !matches!(code, Some(c) if c.starts_with('2')) {
        tracing::warn!(status_line, "remote script answered with a non-success status");
    }
}

/// Open a local script. A file that cannot be opened reads as an empty script.
pub fn open_local(path: &Path) -> Box<dyn BufRead> {
    match File::open(path) {
        Ok(file) => Box::new(BufReader::new(file)),
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "cannot open script, treating it as empty");
            Box::new(io::empty())
        }
    }
}

/// Open the script named by `reference`, local or remote.
pub fn open_script(reference: &str) -> Result<Box<dyn BufRead>, ScriptError> {
    match ScriptRef::parse(reference) {
        ScriptRef::Remote(url) => open_remote(&url),
        ScriptRef::Local(path) => Ok(open_local(&path)),
    }
}
