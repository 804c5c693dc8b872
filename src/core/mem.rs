//! Page-protection control
//!
//! Code and dispatch-table memory is mapped read-only; every patch is
//! bracketed by a writable window over the touched pages. Both operations
//! cover the inclusive page span `[align_down(addr), align_down(addr + len)]`
//! and rely on `mprotect` to invalidate stale translations once the
//! protection bits change.
//!
//! These are fire-and-forget primitives for memory the caller owns: an
//! unmapped or otherwise invalid range is a contract violation and panics
//! rather than returning an error.

use crate::util::memory::{page_align_down, page_size, pages_spanned};
use nix::sys::mman::{ProtFlags, mprotect};
use std::ffi::c_void;
use std::ptr::NonNull;
use tracing::trace;

/// Make the pages backing `[addr, addr + len]` writable.
///
/// The pages keep execute permission while unlocked so code sharing them
/// stays runnable.
///
/// # Safety
///
/// `addr..addr + len` must lie within mapped memory owned by the caller.
///
/// # Panics
///
/// Panics if the protection change is refused.
pub unsafe fn make_writable(addr: usize, len: usize) {
	trace!("mem: unlocking {addr:#x}+{len:#x} ({} page(s))", pages_spanned(addr, len));
	unsafe {
		set_protection(addr, len, ProtFlags::PROT_READ | ProtFlags::PROT_WRITE | ProtFlags::PROT_EXEC);
	}
}

/// Restore the pages backing `[addr, addr + len]` to read-only.
///
/// # Safety
///
/// `addr..addr + len` must lie within mapped memory owned by the caller.
///
/// # Panics
///
/// Panics if the protection change is refused.
pub unsafe fn make_read_only(addr: usize, len: usize) {
	trace!("mem: locking {addr:#x}+{len:#x} ({} page(s))", pages_spanned(addr, len));
	unsafe {
		set_protection(addr, len, ProtFlags::PROT_READ | ProtFlags::PROT_EXEC);
	}
}

unsafe fn set_protection(addr: usize, len: usize, prot: ProtFlags) {
	let start = page_align_down(addr);
	let span = page_align_down(addr + len) - start + page_size();

	let Some(start_ptr) = NonNull::new(start as *mut c_void) else {
		panic!("mem: refusing to retag the null page ({addr:#x}+{len:#x})");
	};

	if let Err(err) = unsafe { mprotect(start_ptr, span, prot) } {
		panic!("mem: mprotect({start:#x}, {span:#x}, {prot:?}) failed: {err}");
	}
}
