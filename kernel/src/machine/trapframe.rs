/*!
 * Trap Frames
 *
 * Register state saved when user code traps into the kernel. `v0` carries
 * the syscall number in and the result or errno out; `a3` is the error
 * flag. Registers are 64 bits wide so 64-bit offsets travel in a single
 * argument register.
 */

use super::usermode::UserCtx;
use std::fmt;
use std::sync::Arc;

/// Width of one instruction; `epc` advances by this on syscall return
pub const INSN_SIZE: u64 = 4;

/// User code resumed by a forked child in place of the parent's remaining
/// instruction stream
pub type Continuation = Arc<dyn Fn(&mut UserCtx) -> i32 + Send + Sync>;

#[derive(Clone, Default)]
pub struct TrapFrame {
    pub v0: i64,
    pub a0: i64,
    pub a1: i64,
    pub a2: i64,
    pub a3: i64,
    pub epc: u64,
    pub sp: u64,
    pub continuation: Option<Continuation>,
}

impl TrapFrame {
    /// Frame for syscall `num` with up to four arguments
    pub fn syscall(num: i64, args: [i64; 4]) -> Self {
        Self {
            v0: num,
            a0: args[0],
            a1: args[1],
            a2: args[2],
            a3: args[3],
            ..Default::default()
        }
    }

    /// Store a successful result
    pub fn set_return(&mut self, value: i64) {
        self.v0 = value;
        self.a3 = 0;
        self.epc += INSN_SIZE;
    }

    /// Store a failure code
    pub fn set_error(&mut self, code: i32) {
        self.v0 = code as i64;
        self.a3 = 1;
        self.epc += INSN_SIZE;
    }

    pub fn failed(&self) -> bool {
        self.a3 != 0
    }
}

impl fmt::Debug for TrapFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrapFrame")
            .field("v0", &self.v0)
            .field("a0", &self.a0)
            .field("a1", &self.a1)
            .field("a2", &self.a2)
            .field("a3", &self.a3)
            .field("epc", &format_args!("{:#x}", self.epc))
            .field("sp", &format_args!("{:#x}", self.sp))
            .field("continuation", &self.continuation.is_some())
            .finish()
    }
}
