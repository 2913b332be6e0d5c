/*!
 * Open-File Management
 *
 * Reference-counted open files, the system-wide open-file pool and the
 * per-process descriptor table.
 */

pub mod fdtable;
pub mod openfile;
pub mod stdio;

pub use fdtable::FileTable;
pub use openfile::{OpenFile, OpenFilePool};
pub use stdio::{start_stdio, StdStreams};
