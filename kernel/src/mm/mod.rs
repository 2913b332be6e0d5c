/*!
 * Memory Management
 *
 * Simulated 32-bit user address spaces and the checked routines the kernel
 * uses to move data across the user/kernel boundary.
 */

pub mod addrspace;
pub mod copyinout;

pub use addrspace::{AddrSpace, PageBudget, RegionKind};
pub use copyinout::{
    check_user_range, copyin, copyin_u32, copyinstr, copyout, copyout_u32, precheck_user_ptr,
};
