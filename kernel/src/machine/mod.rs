/*!
 * Machine Layer
 *
 * Trap frames, the program loader and the simulated user mode that together
 * stand in for the CPU and the executable format.
 */

pub mod loader;
pub mod trapframe;
pub mod usermode;

pub use loader::{executable_image, load_program, ProgramRegistry, UserProgram, EXEC_MAGIC};
pub use trapframe::{Continuation, TrapFrame, INSN_SIZE};
pub use usermode::{enter_forked_process, enter_new_process, UserCtx};
