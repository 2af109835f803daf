use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadError {
    /// The counter file does not exist or cannot be opened on this host.
    #[error("source {path} unavailable: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Malformed or short line.
    #[error("cannot parse {source_name}: {reason}")]
    Parse {
        source_name: &'static str,
        reason: String,
    },

    /// The process exited between the directory listing and the stat read.
    #[error("process {pid} vanished during scan")]
    TransientRace { pid: u32 },
}

impl ReadError {
    pub fn parse(source_name: &'static str, reason: impl Into<String>) -> Self {
        ReadError::Parse {
            source_name,
            reason: reason.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ReadError::TransientRace { .. })
    }
}

pub type ReadResult<T> = Result<T, ReadError>;
