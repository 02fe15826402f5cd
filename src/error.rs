use std::io;

use thiserror::Error;

/// Failure to turn a script reference into a readable line stream.
///
/// Each of these aborts only the nested script that triggered it; the enclosing
/// script keeps running.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("malformed URL '{url}': missing '//' before the host")]
    MalformedUrl { url: String },
    #[error("malformed URL '{url}': missing '/' after the host")]
    MissingPath { url: String },
    #[error("invalid port '{port}' in URL '{url}'")]
    InvalidPort { url: String, port: String },
    #[error("cannot connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: String,
        #[source]
        source: io::Error,
    },
    #[error("error talking to {host}: {source}")]
    Transport {
        host: String,
        #[source]
        source: io::Error,
    },
    /// The script opened fine but a later line could not be read.
    #[error("cannot read script '{reference}': {source}")]
    Read {
        reference: String,
        #[source]
        source: io::Error,
    },
}

/// Failure while dispatching a composite verb.
///
/// Everything except [`DispatchError::Output`] is reported to the user and the
/// enclosing script moves on to its next line.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{verb}: missing script reference")]
    MissingScriptReference { verb: String },
    #[error(transparent)]
    Script(#[from] ScriptError),
    /// Writing output failed; nothing sensible can continue.
    #[error("output error: {0}")]
    Output(#[from] io::Error),
}
