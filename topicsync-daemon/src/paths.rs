use std::path::{Path, PathBuf};

use topicsync_core::store;

pub const DAEMON_SOCKET: &str = "daemon.sock";

pub fn topicsync_root(home: &Path) -> PathBuf {
    store::root_at(home)
}

pub fn socket_path(home: &Path) -> PathBuf {
    topicsync_root(home).join(DAEMON_SOCKET)
}
