//! Discovery of the peer's IPC endpoint.
//!
//! The desktop client listens on the first free slot of `discord-ipc-0`
//! through `discord-ipc-9`. On Unix the socket lives in the runtime or temp
//! directory (possibly under a sandbox sub-directory); on Windows it is a
//! named pipe.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ProtocolError, Result};

/// Number of endpoint slots probed.
pub const ENDPOINT_SLOTS: u8 = 10;

/// File name of endpoint slot `index`.
pub fn endpoint_name(index: u8) -> String {
    format!("discord-ipc-{index}")
}

/// Directories that may contain the socket, in probe order.
#[cfg(unix)]
pub fn candidate_dirs() -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"]
        .iter()
        .filter_map(|var| std::env::var_os(var))
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .collect();
    roots.push(PathBuf::from("/tmp"));

    let mut dirs = Vec::with_capacity(roots.len() * 4);
    for root in roots {
        for sub in ["", "app/com.discordapp.Discord", "snap.discord", ".flatpak/com.discordapp.Discord/xdg-run"] {
            let dir = if sub.is_empty() { root.clone() } else { root.join(sub) };
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
    }
    dirs
}

/// First existing endpoint under `dirs`, slots probed in order within each
/// directory.
pub fn find_in_dirs(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| (0..ENDPOINT_SLOTS).map(move |i| dir.join(endpoint_name(i))))
        .find(|path| endpoint_exists(path))
}

/// Locate the peer's endpoint.
///
/// # Errors
/// `EndpointNotFound` if no slot exists.
#[cfg(unix)]
pub fn find_ipc_endpoint() -> Result<PathBuf> {
    let found = find_in_dirs(&candidate_dirs()).ok_or(ProtocolError::EndpointNotFound)?;
    debug!(endpoint = %found.display(), "Found IPC endpoint");
    Ok(found)
}

/// Locate the peer's named pipe.
#[cfg(windows)]
pub fn find_ipc_endpoint() -> Result<PathBuf> {
    let found = find_in_dirs(&[PathBuf::from(r"\\?\pipe")]).ok_or(ProtocolError::EndpointNotFound)?;
    debug!(endpoint = %found.display(), "Found IPC endpoint");
    Ok(found)
}

fn endpoint_exists(path: &Path) -> bool {
    std::fs::metadata(path).is_ok()
}
