/*!
 * Console Device
 *
 * Character console behind the `con:` device. `BufferConsole` keeps input
 * and output in memory for tests; `StdioConsole` talks to the host terminal.
 */

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::Arc;

use super::traits::{Device, Vnode, VnodeRef};
use super::types::*;

/// A character console
pub trait Console: Send + Sync {
    fn putch(&self, ch: u8);

    /// Next input character, or `None` when no input is available
    fn getch(&self) -> Option<u8>;
}

/// In-memory console with scripted input and captured output
#[derive(Debug, Default)]
pub struct BufferConsole {
    input: Mutex<VecDeque<u8>>,
    output: Mutex<Vec<u8>>,
}

impl BufferConsole {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue bytes for later `getch` calls
    pub fn push_input(&self, bytes: &[u8]) {
        self.input.lock().extend(bytes.iter().copied());
    }

    /// Everything written so far
    pub fn output(&self) -> Vec<u8> {
        self.output.lock().clone()
    }

    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output.lock()).into_owned()
    }

    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut *self.output.lock())
    }
}

impl Console for BufferConsole {
    fn putch(&self, ch: u8) {
        self.output.lock().push(ch);
    }

    fn getch(&self) -> Option<u8> {
        self.input.lock().pop_front()
    }
}

/// Console on the host's stdin/stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioConsole;

impl Console for StdioConsole {
    fn putch(&self, ch: u8) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(&[ch]);
        if ch == b'\n' {
            let _ = out.flush();
        }
    }

    fn getch(&self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match std::io::stdin().lock().read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }
}

/// Read up to `buf.len()` bytes, stopping after a newline or when input runs dry
pub fn console_read(console: &dyn Console, buf: &mut [u8]) -> usize {
    let mut n = 0;
    while n < buf.len() {
        match console.getch() {
            Some(ch) => {
                buf[n] = ch;
                n += 1;
                if ch == b'\n' {
                    break;
                }
            }
            None => break,
        }
    }
    n
}

pub fn console_write(console: &dyn Console, data: &[u8]) -> usize {
    for &ch in data {
        console.putch(ch);
    }
    data.len()
}

/// Vnode for an open console
pub struct ConsoleVnode {
    console: Arc<dyn Console>,
}

impl Vnode for ConsoleVnode {
    fn read_at(&self, _offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        Ok(console_read(self.console.as_ref(), buf))
    }

    fn write_at(&self, _offset: u64, data: &[u8]) -> VfsResult<usize> {
        Ok(console_write(self.console.as_ref(), data))
    }

    fn stat(&self) -> VfsResult<Stat> {
        Ok(Stat {
            ino: 0,
            size: 0,
            file_type: FileType::Device,
            mode: 0o666,
            nlink: 1,
        })
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn close(&self) -> VfsResult<()> {
        Ok(())
    }
}

/// The `con` device
pub struct ConsoleDevice {
    console: Arc<dyn Console>,
}

impl ConsoleDevice {
    pub fn new(console: Arc<dyn Console>) -> Self {
        Self { console }
    }
}

impl Device for ConsoleDevice {
    fn open(&self, _flags: OpenFlags) -> VfsResult<VnodeRef> {
        Ok(Arc::new(ConsoleVnode {
            console: Arc::clone(&self.console),
        }))
    }

    fn name(&self) -> &str {
        "con"
    }
}
