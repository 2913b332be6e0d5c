/*!
 * Program Loader
 *
 * Executables are files that start with `\x7fSIM` followed by the name of a
 * registered program. Loading maps a text page holding that name plus a heap
 * region, and yields the entry point. User mode later reads the name back
 * from the entry address to find the code to run.
 */

use super::trapframe::Continuation;
use super::usermode::UserCtx;
use crate::core::errors::Errno;
use crate::core::limits::{HEAP_BASE, PAGE_SIZE, TEXT_BASE};
use crate::core::types::{SysResult, VAddr};
use crate::mm::{AddrSpace, RegionKind};
use crate::vfs::VnodeRef;
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Magic bytes at the start of every executable
pub const EXEC_MAGIC: &[u8; 4] = b"\x7fSIM";

/// A user program body
pub type UserProgram = Continuation;

/// File contents of the executable for program `name`
pub fn executable_image(name: &str) -> Vec<u8> {
    let mut image = EXEC_MAGIC.to_vec();
    image.extend_from_slice(name.as_bytes());
    image
}

/// Name to program body
#[derive(Default)]
pub struct ProgramRegistry {
    programs: DashMap<String, UserProgram, RandomState>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, name: &str, program: F)
    where
        F: Fn(&mut UserCtx) -> i32 + Send + Sync + 'static,
    {
        self.insert(name, Arc::new(program));
    }

    /// Register an already shared program body
    pub fn insert(&self, name: &str, program: UserProgram) {
        self.programs.insert(name.to_string(), program);
    }

    pub fn get(&self, name: &str) -> Option<UserProgram> {
        self.programs.get(name).map(|p| Arc::clone(p.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.programs.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

/// Read and validate the executable header of `vnode`
fn read_program_name(vnode: &VnodeRef) -> SysResult<String> {
    let mut header = vec![0u8; PAGE_SIZE];
    let n = vnode.read_at(0, &mut header)?;
    let header = &header[..n];
    if n <= EXEC_MAGIC.len() || &header[..EXEC_MAGIC.len()] != EXEC_MAGIC {
        return Err(Errno::NoExec);
    }
    let name = &header[EXEC_MAGIC.len()..];
    let name = name.split(|&b| b == 0 || b == b'\n').next().unwrap_or_default();
    std::str::from_utf8(name)
        .map(str::to_string)
        .map_err(|_| Errno::NoExec)
}

/// Load the executable in `vnode` into `space`; returns the entry point
pub fn load_program(
    vnode: &VnodeRef,
    space: &mut AddrSpace,
    programs: &ProgramRegistry,
    heap_pages: usize,
) -> SysResult<VAddr> {
    let name = read_program_name(vnode)?;
    if !programs.contains(&name) {
        warn!(program = %name, "no such program registered");
        return Err(Errno::NoExec);
    }

    space.define_region(RegionKind::Text, TEXT_BASE, 1)?;
    let mut text = name.clone().into_bytes();
    text.push(0);
    space.write(TEXT_BASE, &text)?;
    if heap_pages > 0 {
        space.define_region(RegionKind::Heap, HEAP_BASE, heap_pages)?;
    }
    debug!(program = %name, entry = format_args!("{:#x}", TEXT_BASE), "program loaded");
    Ok(TEXT_BASE)
}

/// Name stored at `entry` in `space`
pub(crate) fn program_at(space: &AddrSpace, entry: VAddr) -> SysResult<String> {
    let mut text = vec![0u8; PAGE_SIZE];
    space.read(entry, &mut text)?;
    let end = text.iter().position(|&b| b == 0).ok_or(Errno::NoExec)?;
    String::from_utf8(text[..end].to_vec()).map_err(|_| Errno::NoExec)
}
