//! Destination for the raw log payload.
//!
//! Files are written through a temporary sibling that is renamed over the
//! target once every byte is on disk, so an interrupted run leaves either
//! the previous file or no file, never a truncated one. The target's parent
//! directory must already exist.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{FetchError, Result};

/// Where the payload goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Standard output (the default when no `-o` is given).
    Stdout,
    /// A file, replaced atomically.
    File(PathBuf),
}

impl OutputTarget {
    /// `File` when a path was given, `Stdout` otherwise.
    pub fn from_arg(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => OutputTarget::File(path),
            None => OutputTarget::Stdout,
        }
    }

    /// Writes `payload` verbatim.
    ///
    /// # Errors
    ///
    /// `FetchError::Io` naming the destination when the parent directory is
    /// missing or unwritable, the rename fails, or stdout is closed.
    pub fn write_payload(&self, payload: &[u8]) -> Result<()> {
        let outcome = match self {
            OutputTarget::Stdout => write_to(io::stdout().lock(), payload),
            OutputTarget::File(path) => write_file_atomically(path, payload),
        };
        outcome.map_err(|source| FetchError::Io {
            target: self.to_string(),
            source,
        })
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::Stdout => f.write_str("standard output"),
            OutputTarget::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Writes and flushes `payload` to any writer.
pub fn write_to<W: Write>(mut writer: W, payload: &[u8]) -> io::Result<()> {
    writer.write_all(payload)?;
    writer.flush()
}

fn write_file_atomically(path: &Path, payload: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut builder = tempfile::Builder::new();
    builder.prefix(".hik-logdump-").suffix(".part");
    // tempfile defaults to 0600; ask for 0666 and let the umask apply.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    let mut tmp = builder.tempfile_in(parent)?;
    write_to(&mut tmp, payload)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
