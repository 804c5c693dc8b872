//! Page arithmetic
//!
//! Helpers for mapping byte ranges onto the page frames that back them.

/// Get the system page size
#[inline]
#[must_use]
pub fn page_size() -> usize {
	unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

/// Align an address down to the page boundary that contains it
#[inline]
#[must_use]
pub fn page_align_down(addr: usize) -> usize {
	addr & !(page_size() - 1)
}

/// Check whether an address sits exactly on a page boundary
#[inline]
#[must_use]
pub fn is_page_aligned(addr: usize) -> bool {
	addr % page_size() == 0
}

/// Number of page frames spanned by `[addr, addr + len]`, boundaries included
///
/// A zero-length range still spans the single page containing `addr`.
#[inline]
#[must_use]
pub fn pages_spanned(addr: usize, len: usize) -> usize {
	(page_align_down(addr + len) - page_align_down(addr)) / page_size() + 1
}
