/*!
 * Program Execution
 *
 * execv replaces the caller's image in three stages. Everything that can
 * fail on the caller's input (argument count, string copy-in, marshalling,
 * opening the program, console streams) happens first while the old image
 * is untouched. The new image is then built in a detached address space
 * that is only swapped in once loading, stack setup and argument copy-out
 * have all succeeded. Dropping the detached space on failure returns its
 * pages to the budget and leaves the caller exactly as it was.
 */

use super::curproc;
use crate::core::errors::Errno;
use crate::core::limits::{PATH_MAX, USER_PTR_SIZE};
use crate::core::types::{SysResult, UserPtr, VAddr};
use crate::file::StdStreams;
use crate::kernel::Kernel;
use crate::machine::{enter_new_process, load_program};
use crate::mm::{copyin_u32, copyinstr, precheck_user_ptr, AddrSpace};
use crate::vfs::{OpenFlags, VnodeRef};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stack alignment of the initial user stack pointer
const STACK_ALIGN: u32 = 8;

fn pad_to_ptr(len: usize) -> usize {
    len.div_ceil(USER_PTR_SIZE) * USER_PTR_SIZE
}

/// Marshalled argument vector.
///
/// Layout: `argc + 1` pointer slots (the last one NULL) followed by the
/// NUL-terminated strings, each padded to pointer width. While staged in
/// the kernel the slots hold offsets from the start of the block; `place`
/// turns them into user addresses once the block's stack address is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgBlock {
    bytes: Vec<u8>,
    argc: usize,
}

impl ArgBlock {
    /// Lay out `args`; E2BIG if the block would exceed `arg_max` bytes
    pub fn marshal<S: AsRef<str>>(args: &[S], arg_max: usize) -> SysResult<Self> {
        let header = (args.len() + 1) * USER_PTR_SIZE;
        let strings: usize = args
            .iter()
            .map(|a| pad_to_ptr(a.as_ref().len() + 1))
            .sum();
        let total = header + strings;
        if total > arg_max {
            return Err(Errno::TooBig);
        }

        let mut bytes = vec![0u8; total];
        let mut offset = header;
        for (i, arg) in args.iter().enumerate() {
            let arg = arg.as_ref().as_bytes();
            let slot = i * USER_PTR_SIZE;
            bytes[slot..slot + USER_PTR_SIZE].copy_from_slice(&(offset as u32).to_le_bytes());
            bytes[offset..offset + arg.len()].copy_from_slice(arg);
            offset += pad_to_ptr(arg.len() + 1);
        }
        Ok(Self {
            bytes,
            argc: args.len(),
        })
    }

    pub fn argc(&self) -> usize {
        self.argc
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Slot `i` as currently staged
    pub fn slot(&self, i: usize) -> u32 {
        let at = i * USER_PTR_SIZE;
        u32::from_le_bytes([
            self.bytes[at],
            self.bytes[at + 1],
            self.bytes[at + 2],
            self.bytes[at + 3],
        ])
    }

    /// Copy the block just below `stack_top`, patching the slots into user
    /// addresses. Returns the argv pointer, which is also the new stack
    /// pointer.
    pub fn place(&self, space: &mut AddrSpace, stack_top: VAddr) -> SysResult<VAddr> {
        let len = u32::try_from(self.bytes.len()).map_err(|_| Errno::TooBig)?;
        let base = stack_top.checked_sub(len).ok_or(Errno::TooBig)? & !(STACK_ALIGN - 1);

        let mut patched = self.bytes.clone();
        for i in 0..self.argc {
            let absolute = base + self.slot(i);
            let at = i * USER_PTR_SIZE;
            patched[at..at + USER_PTR_SIZE].copy_from_slice(&absolute.to_le_bytes());
        }
        space.write(base, &patched)?;
        Ok(base)
    }
}

/// A loaded program waiting to be switched to
#[derive(Debug)]
pub(crate) struct LoadedImage {
    pub space: AddrSpace,
    pub entry: VAddr,
    pub argv: VAddr,
}

/// Build a fresh address space holding the program in `vnode` with `args`
/// on its stack
pub(crate) fn load_image(kernel: &Kernel, vnode: &VnodeRef, args: &ArgBlock) -> SysResult<LoadedImage> {
    let config = kernel.config();
    let mut space = AddrSpace::create(Arc::clone(kernel.budget()));
    let entry = load_program(vnode, &mut space, kernel.programs(), config.heap_pages)?;
    let stack_top = space.define_stack(config.stack_pages)?;
    let argv = args.place(&mut space, stack_top)?;
    Ok(LoadedImage { space, entry, argv })
}

/// Close the program file once loading is over, successful or not
pub(crate) fn close_program(vnode: &VnodeRef, path: &str) {
    if let Err(e) = vnode.close() {
        warn!(path, error = %e, "closing program file failed");
    }
}

/// Copy in the NULL-terminated pointer array at `argv`
fn copyin_args(argv: UserPtr, max_args: usize, arg_max: usize) -> SysResult<Vec<String>> {
    let mut ptrs = Vec::new();
    loop {
        let slot = argv.offset((ptrs.len() * USER_PTR_SIZE) as u32);
        let ptr = copyin_u32(slot)?;
        if ptr == 0 {
            break;
        }
        if ptrs.len() == max_args {
            return Err(Errno::TooBig);
        }
        ptrs.push(UserPtr(ptr));
    }

    ptrs.into_iter()
        .map(|ptr| {
            precheck_user_ptr(ptr)?;
            copyinstr(ptr, arg_max).map_err(|e| match e {
                Errno::NameTooLong => Errno::TooBig,
                other => other,
            })
        })
        .collect()
}

/// Replace the calling process's program. Only returns on failure; the
/// caller's image, descriptors and working directory are then unchanged.
pub fn sys_execv(kernel: &Kernel, path: UserPtr, argv: UserPtr) -> SysResult<Infallible> {
    precheck_user_ptr(path)?;
    precheck_user_ptr(argv)?;

    let config = kernel.config();
    let args = copyin_args(argv, config.max_exec_args, config.arg_max)?;
    let path = copyinstr(path, PATH_MAX)?;
    if path.is_empty() {
        return Err(Errno::Inval);
    }
    let block = ArgBlock::marshal(&args, config.arg_max)?;

    let proc = curproc();
    let vnode = kernel.vfs().open(&proc.cwd(), &path, OpenFlags::read_only(), 0)?;
    let loaded = StdStreams::prepare(kernel.vfs(), kernel.pool()).and_then(|streams| {
        load_image(kernel, &vnode, &block).map(move |image| (streams, image))
    });
    close_program(&vnode, &path);
    let (streams, image) = loaded?;

    let LoadedImage { mut space, entry, argv } = image;
    space.activate();
    let old = proc.replace_addrspace(Some(space));
    drop(old);
    streams.install(proc.files());

    info!(pid = proc.pid(), program = %path, argc = block.argc(), "exec");
    debug!(
        pid = proc.pid(),
        entry = format_args!("{:#x}", entry),
        argv = format_args!("{:#x}", argv),
        "entering new image"
    );
    enter_new_process(kernel, block.argc(), UserPtr(argv), argv, entry)
}
