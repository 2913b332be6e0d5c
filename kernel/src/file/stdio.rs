/*!
 * Standard Streams
 *
 * Opens the console three times for descriptors 0, 1 and 2. Exec prepares a
 * fresh set before loading and installs it only once the new image commits,
 * so installing cannot fail. A prepared set that is never installed releases
 * itself on drop.
 */

use super::fdtable::FileTable;
use super::openfile::{OpenFile, OpenFilePool};
use crate::core::limits::{CONSOLE_DEVICE, STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use crate::core::types::{AccessMode, Fd, SysResult};
use crate::kpanic;
use crate::vfs::{OpenFlags, Vfs};
use std::sync::Arc;
use tracing::{debug, warn};

/// Console open files for fds 0..=2, not yet installed
pub struct StdStreams {
    files: Vec<Arc<OpenFile>>,
}

impl StdStreams {
    /// Open `con:` read-only for stdin and write-only for stdout and stderr
    pub fn prepare(vfs: &Vfs, pool: &Arc<OpenFilePool>) -> SysResult<Self> {
        let mut streams = StdStreams { files: Vec::with_capacity(3) };
        for (fd, access) in [
            (STDIN_FILENO, AccessMode::ReadOnly),
            (STDOUT_FILENO, AccessMode::WriteOnly),
            (STDERR_FILENO, AccessMode::WriteOnly),
        ] {
            let vnode = vfs.open("/", CONSOLE_DEVICE, OpenFlags::new(access), 0o664)?;
            let file = OpenFile::open(pool, vnode, access, false, format!("{}{}", CONSOLE_DEVICE, fd))?;
            streams.files.push(file);
        }
        Ok(streams)
    }

    /// Place the streams in slots 0..=2, releasing whatever they displace.
    /// A displaced file that fails to close is logged and otherwise ignored.
    pub fn install(mut self, table: &FileTable) {
        let files = std::mem::take(&mut self.files);
        let mut displaced = Vec::new();
        for (fd, file) in files.into_iter().enumerate() {
            match table.install_at(fd as Fd, file) {
                Ok(prev) => displaced.extend(prev),
                Err(e) => kpanic!("fd {}: no slot for standard stream ({})", fd, e),
            }
        }
        for prev in displaced {
            if let Err(e) = prev.decref() {
                warn!(file = %prev.name(), error = %e, "closing displaced descriptor failed");
            }
        }
        debug!("standard streams installed");
    }
}

impl Drop for StdStreams {
    fn drop(&mut self) {
        for file in self.files.drain(..) {
            if let Err(e) = file.decref() {
                warn!(file = %file.name(), error = %e, "releasing unused stream failed");
            }
        }
    }
}

/// Open and install fresh standard streams
pub fn start_stdio(table: &FileTable, vfs: &Vfs, pool: &Arc<OpenFilePool>) -> SysResult<()> {
    StdStreams::prepare(vfs, pool)?.install(table);
    Ok(())
}
