//! Socket and PID file path resolution.
//!
//! Priority for the socket path:
//! 1. `POMOBAR_SOCKET_DIR/pomobar.sock` (explicit override)
//! 2. `/tmp/pomobar-0.sock` for root
//! 3. `XDG_RUNTIME_DIR/pomobar.sock` (Linux standard)
//! 4. `/run/user/<uid>/pomobar.sock` (last resort)
//!
//! The PID file sits next to the socket with a `.pid` extension.

use std::env;
use std::path::{Path, PathBuf};

/// Socket file name inside a per-user directory.
pub const SOCKET_NAME: &str = "pomobar.sock";

/// Fixed socket path for the privileged user.
pub const ROOT_SOCKET_PATH: &str = "/tmp/pomobar-0.sock";

/// Real user id of the calling process.
pub fn current_uid() -> u32 {
    // SAFETY: getuid takes no arguments, touches no memory and cannot fail.
    unsafe { libc::getuid() }
}

/// Get the socket path for the calling user.
pub fn get_socket_path() -> PathBuf {
    // Explicit override (ignore empty)
    if let Ok(dir) = env::var("POMOBAR_SOCKET_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir).join(SOCKET_NAME);
        }
    }

    socket_path_for(current_uid(), dirs::runtime_dir())
}

/// Socket path for a given uid and runtime directory.
pub(crate) fn socket_path_for(uid: u32, runtime_dir: Option<PathBuf>) -> PathBuf {
    if uid == 0 {
        return PathBuf::from(ROOT_SOCKET_PATH);
    }

    runtime_dir
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(format!("/run/user/{}", uid)))
        .join(SOCKET_NAME)
}

/// PID file path for a socket path.
pub fn pid_path_for(socket_path: &Path) -> PathBuf {
    socket_path.with_extension("pid")
}

/// Ensure the socket's parent directory exists.
///
/// A missing directory is created with 0700 permissions; an existing one is
/// left untouched (it may be `/tmp` or the user's runtime directory).
pub fn ensure_parent_dir(socket_path: &Path) -> std::io::Result<()> {
    let Some(dir) = socket_path.parent() else {
        return Ok(());
    };
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }

    std::fs::create_dir_all(dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
    }

    Ok(())
}
