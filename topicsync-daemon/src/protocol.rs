//! Control-socket messages and the blocking client the CLI talks through.
//!
//! Each side writes one JSON object per line. Requests are tagged by `cmd`;
//! every reply is a [`Reply`] envelope around a command-specific payload.

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use topicsync_sync::RunSummary;

use crate::error::DaemonError;
use crate::paths::socket_path;

const STATUS_ATTEMPTS: u32 = 5;
const STATUS_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum DaemonRequest {
    Status,
    /// Run now; `channel` narrows the run to one config.
    Sync {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
    },
    Stop,
}

/// Envelope for every reply line: `data` on success, `error` otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Reply<T> {
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn into_result(self) -> Result<T, DaemonError> {
        if !self.ok {
            return Err(DaemonError::Rejected(
                self.error.unwrap_or_else(|| "no reason given".to_string()),
            ));
        }
        self.data
            .ok_or_else(|| DaemonError::Protocol("successful reply carried no data".to_string()))
    }
}

/// Outcome line for one channel in a [`RunRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub channel: String,
    /// `applied`, `dry_run`, `unchanged` or `failed`.
    pub status: String,
    /// Written topic on success, error message on failure.
    pub detail: String,
}

impl ChannelStatus {
    pub fn is_failed(&self) -> bool {
        self.status == "failed"
    }
}

/// One completed run: what triggered it and how each channel fared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// `all` or the channel id the run was narrowed to.
    pub target: String,
    /// `interval` or `socket`.
    pub source: String,
    pub dry_run: bool,
    pub finished_at_unix: u64,
    pub duration_ms: u64,
    pub summary: RunSummary,
    pub channels: Vec<ChannelStatus>,
}

impl RunRecord {
    pub fn failed_channels(&self) -> impl Iterator<Item = &ChannelStatus> {
        self.channels.iter().filter(|status| status.is_failed())
    }
}

/// Payload of a `status` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub running: bool,
    pub started_at_unix: u64,
    pub interval_secs: u64,
    pub dry_run: bool,
    pub socket: PathBuf,
    pub channels_dir: PathBuf,
    pub last_run: Option<RunRecord>,
}

/// Payload of a `stop` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopAck {
    pub stopping: bool,
}

/// Blocking client for the daemon's Unix socket.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket: PathBuf,
}

impl DaemonClient {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    pub fn for_home(home: &Path) -> Self {
        Self::new(socket_path(home))
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// Runtime status, retrying briefly while a just-started daemon binds.
    pub fn status(&self) -> Result<DaemonStatus, DaemonError> {
        let mut attempt = 1;
        loop {
            match self.call(&DaemonRequest::Status) {
                Err(DaemonError::NotRunning { .. }) if attempt < STATUS_ATTEMPTS => {
                    attempt += 1;
                    sleep(STATUS_RETRY_DELAY);
                }
                other => return other,
            }
        }
    }

    /// Trigger a run and block until the daemon reports its outcome.
    pub fn sync(&self, channel: Option<String>) -> Result<RunRecord, DaemonError> {
        self.call(&DaemonRequest::Sync { channel })
    }

    pub fn stop(&self) -> Result<(), DaemonError> {
        self.call::<StopAck>(&DaemonRequest::Stop).map(|_| ())
    }

    /// Send one request and decode its reply payload as `T`.
    pub fn call<T: DeserializeOwned>(&self, request: &DaemonRequest) -> Result<T, DaemonError> {
        let line = self.exchange(request)?;
        serde_json::from_str::<Reply<T>>(&line)?.into_result()
    }

    fn exchange(&self, request: &DaemonRequest) -> Result<String, DaemonError> {
        let mut stream = UnixStream::connect(&self.socket).map_err(|err| match err.kind() {
            ErrorKind::NotFound | ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset => {
                DaemonError::NotRunning {
                    socket: self.socket.clone(),
                }
            }
            _ => DaemonError::io(self.socket.display(), err),
        })?;

        let mut payload = serde_json::to_string(request)?;
        payload.push('\n');
        stream
            .write_all(payload.as_bytes())
            .and_then(|()| stream.flush())
            .map_err(|err| DaemonError::io(self.socket.display(), err))?;

        let mut line = String::new();
        let read = BufReader::new(stream)
            .read_line(&mut line)
            .map_err(|err| DaemonError::io(self.socket.display(), err))?;
        if read == 0 {
            return Err(DaemonError::Protocol(
                "daemon closed the connection without replying".to_string(),
            ));
        }
        Ok(line)
    }
}
