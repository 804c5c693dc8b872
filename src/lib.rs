//! symhook-rs - runtime symbol overrides and syscall-table patching
//!
//! This crate redirects calls to any resolvable symbol by writing a
//! fixed-size absolute jump over the function's first bytes, and swaps
//! entries of a syscall dispatch table in place. No relinking, no breakpoint
//! machinery: just page-protection toggling around raw writes to live
//! memory, with the original bytes saved so every patch is reversible.
//!
//! # Getting started
//!
//! ```no_run
//! use symhook_rs::DlsymResolver;
//!
//! unsafe extern "C" fn fake_getuid() -> u32 {
//! 	0
//! }
//!
//! fn main() -> symhook_rs::Result<()> {
//! 	symhook_rs::util::init_logging();
//!
//! 	let resolver = DlsymResolver::new();
//! 	let hook = unsafe { symhook_rs::hook(&resolver, "getuid", fake_getuid as usize)? };
//! 	// every call to getuid() now lands in fake_getuid()
//!
//! 	unsafe { hook.restore() };
//! 	Ok(())
//! }
//! ```
//!
//! Patching live code is inherently dangerous: a function whose body jumps
//! back into its own first 12 bytes, or a core executing the target during
//! the write, will misbehave in ways this crate cannot detect. The API keeps
//! every raw write behind [`SymbolOverride`] and [`SyscallPatcher`] so
//! callers only ever deal in handles and results.

pub mod core;
pub mod error;
pub mod resolve;
pub mod util;

pub use crate::core::jump::{JUMP_SIZE, build_jump};
pub use crate::core::sym::SymbolOverride;
pub use crate::core::table::{SYSCALL_TABLE_ENTRIES, SyscallPatcher};
pub use crate::error::{HookError, Result};
pub use crate::resolve::{DlsymResolver, FixedResolver, SymbolResolver};

/// Resolve `name` and immediately install an override redirecting it to
/// `replacement`.
///
/// Shorthand for [`SymbolOverride::new`] followed by
/// [`enable`](SymbolOverride::enable). The returned handle restores the
/// original code via [`disable`](SymbolOverride::disable) or
/// [`restore`](SymbolOverride::restore).
///
/// # Errors
///
/// [`HookError::SymbolNotFound`] if the resolver does not know `name`.
///
/// # Safety
///
/// Same contract as [`SymbolOverride::enable`].
pub unsafe fn hook(resolver: &dyn SymbolResolver, name: &str, replacement: usize) -> Result<SymbolOverride> {
	let sym = SymbolOverride::new(resolver, name, replacement)?;
	unsafe { sym.enable() };
	Ok(sym)
}
