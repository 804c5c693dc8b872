//! Symbol override lifecycle
//!
//! A [`SymbolOverride`] owns one patched symbol: the resolved address, the
//! bytes that were there first, the generated jump and the flags describing
//! where in its lifecycle the override currently is. Installing writes the
//! jump over the function preamble; disabling writes the saved preamble
//! back. Nothing here disassembles the target, so functions whose body jumps
//! back into the clobbered first [`JUMP_SIZE`] bytes are not supported.
//!
//! Protection policy: every public operation returns with the target pages
//! read-only again. The one exception is [`SymbolOverride::call_through`],
//! which deliberately leaves the pages writable between the repeated
//! uninstall/reinstall cycles it exists to amortize; see its documentation
//! for the trade-off.

use crate::core::jump::{JUMP_SIZE, build_jump};
use crate::core::mem;
use crate::error::{HookError, Result};
use crate::resolve::SymbolResolver;
use crate::util::sync::SpinLock;
use std::cell::UnsafeCell;
use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// One symbol's override, from resolution to restoration.
pub struct SymbolOverride {
	name: String,
	/// Resolved address of the overridden symbol; fixed for the lifetime of
	/// the instance.
	target: usize,
	replacement: usize,
	installed: AtomicBool,
	trampoline_ready: AtomicBool,
	mem_protected: AtomicBool,
	saved: UnsafeCell<[u8; JUMP_SIZE]>,
	trampoline: UnsafeCell<[u8; JUMP_SIZE]>,
	lock: SpinLock,
}

// SAFETY: `target` and `replacement` are plain addresses. The byte buffers
// are written exactly once, before `trampoline_ready` is published with
// Release ordering, and only read afterwards; the install/uninstall copies
// that consume them are serialized by `lock`.
unsafe impl Sync for SymbolOverride {}

impl SymbolOverride {
	/// Resolve `name` and set up an override redirecting it to
	/// `replacement`.
	///
	/// The instance starts out inert: nothing is patched until
	/// [`enable`](Self::enable), and the trampoline itself is generated
	/// lazily on first install. The target pages are assumed read-only, as
	/// code pages are by default.
	///
	/// # Errors
	///
	/// [`HookError::SymbolNotFound`] if the resolver does not know `name`;
	/// no instance is produced.
	pub fn new(resolver: &dyn SymbolResolver, name: &str, replacement: usize) -> Result<Self> {
		let Some(target) = resolver.resolve(name) else {
			warn!("override: failed to locate an address for {name}");
			return Err(HookError::SymbolNotFound(name.to_string()));
		};
		debug!("override: {name} found @ {target:#x}, replacement {replacement:#x}");

		Ok(Self {
			name: name.to_string(),
			target,
			replacement,
			installed: AtomicBool::new(false),
			trampoline_ready: AtomicBool::new(false),
			mem_protected: AtomicBool::new(true),
			saved: UnsafeCell::new([0; JUMP_SIZE]),
			trampoline: UnsafeCell::new([0; JUMP_SIZE]),
			lock: SpinLock::new(),
		})
	}

	/// Install the override.
	///
	/// Idempotent: enabling an installed override is a no-op. On first
	/// install this generates the jump and snapshots the bytes it clobbers,
	/// so a later [`disable`](Self::disable) can restore them exactly. The
	/// target pages are read-only again when this returns.
	///
	/// # Safety
	///
	/// The resolved target must still be mapped executable memory, and no
	/// other core may be executing the first [`JUMP_SIZE`] bytes of the
	/// target while the write happens. The write is serialized against other
	/// operations on this instance, but not against execution of the target
	/// itself; that window is an accepted risk of in-place patching.
	pub unsafe fn enable(&self) {
		unsafe {
			self.install();
			if !self.mem_protected.load(Ordering::Relaxed) {
				self.protect();
			}
		}
	}

	/// Write the saved original bytes back over the target.
	///
	/// Idempotent: disabling a non-installed override is a no-op. The target
	/// pages are read-only again when this returns.
	///
	/// # Safety
	///
	/// Same contract as [`enable`](Self::enable).
	pub unsafe fn disable(&self) {
		unsafe {
			self.uninstall();
			if !self.mem_protected.load(Ordering::Relaxed) {
				self.protect();
			}
		}
	}

	/// Temporarily restore the original code, hand its address to `f`, then
	/// reinstall the override.
	///
	/// This is the amortized call-through path: the target pages stay
	/// writable across the uninstall/reinstall pair and between repeated
	/// calls, skipping two protection flips per invocation. The cost is an
	/// open window in which external writes to the target would go
	/// undetected. Callers that call through once should prefer a plain
	/// [`disable`](Self::disable)/[`enable`](Self::enable) pair, which
	/// re-locks the pages each time.
	///
	/// # Safety
	///
	/// Same contract as [`enable`](Self::enable); additionally `f` must not
	/// reenter this instance, and whatever it does with the address must be
	/// done before it returns; the original code is gone again afterwards.
	pub unsafe fn call_through<R>(&self, f: impl FnOnce(usize) -> R) -> R {
		unsafe {
			self.uninstall();
			let out = f(self.target);
			self.install();
			out
		}
	}

	/// Disable the override and release it.
	///
	/// # Safety
	///
	/// Same contract as [`enable`](Self::enable).
	pub unsafe fn restore(self) {
		debug!("override: restoring {} @ {:#x}", self.name, self.target);
		unsafe { self.disable() };
	}

	/// Whether the jump is currently written over the target.
	#[must_use]
	pub fn is_installed(&self) -> bool {
		self.installed.load(Ordering::Acquire)
	}

	/// Whether the target pages are currently read-only.
	#[must_use]
	pub fn is_memory_protected(&self) -> bool {
		self.mem_protected.load(Ordering::Relaxed)
	}

	/// The resolved address of the overridden symbol.
	#[must_use]
	pub fn original_address(&self) -> usize {
		self.target
	}

	/// The address calls are redirected to while installed.
	#[must_use]
	pub fn replacement(&self) -> usize {
		self.replacement
	}

	/// The symbol name this override was created for.
	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Write the jump over the target, leaving page protection wherever the
	/// operation put it (off).
	unsafe fn install(&self) {
		if self.installed.load(Ordering::Acquire) {
			debug!("override: {} already installed", self.name);
			return;
		}

		if !self.trampoline_ready.load(Ordering::Acquire) {
			unsafe { self.prepare_trampoline() };
		}
		if self.mem_protected.load(Ordering::Relaxed) {
			unsafe { self.unprotect() };
		}

		let _guard = self.lock.guard();
		debug!("override: writing jump to {:#x}", self.target);
		unsafe {
			ptr::copy_nonoverlapping((*self.trampoline.get()).as_ptr(), self.target as *mut u8, JUMP_SIZE);
		}
		self.installed.store(true, Ordering::Release);
	}

	/// Put the saved bytes back, leaving page protection off.
	unsafe fn uninstall(&self) {
		if !self.installed.load(Ordering::Acquire) {
			debug!("override: {} not installed", self.name);
			return;
		}

		if self.mem_protected.load(Ordering::Relaxed) {
			unsafe { self.unprotect() };
		}

		let _guard = self.lock.guard();
		debug!("override: writing original code to {:#x}", self.target);
		unsafe {
			ptr::copy_nonoverlapping((*self.saved.get()).as_ptr(), self.target as *mut u8, JUMP_SIZE);
		}
		self.installed.store(false, Ordering::Release);
	}

	/// Generate the jump and snapshot the bytes it will clobber.
	unsafe fn prepare_trampoline(&self) {
		debug!(
			"override: generating jump for {} ({:#x} -> {:#x})",
			self.name, self.target, self.replacement
		);
		unsafe {
			*self.trampoline.get() = build_jump(self.replacement);
			ptr::copy_nonoverlapping(self.target as *const u8, (*self.saved.get()).as_mut_ptr(), JUMP_SIZE);
		}
		self.trampoline_ready.store(true, Ordering::Release);
	}

	unsafe fn unprotect(&self) {
		unsafe { mem::make_writable(self.target, JUMP_SIZE) };
		self.mem_protected.store(false, Ordering::Relaxed);
	}

	unsafe fn protect(&self) {
		unsafe { mem::make_read_only(self.target, JUMP_SIZE) };
		self.mem_protected.store(true, Ordering::Relaxed);
	}
}

impl Drop for SymbolOverride {
	fn drop(&mut self) {
		if self.is_installed() {
			// releasing the saved bytes makes the patch irreversible
			warn!(
				"override: dropping {} while installed; the jump at {:#x} is now permanent",
				self.name, self.target
			);
		}
	}
}

impl fmt::Debug for SymbolOverride {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SymbolOverride")
			.field("name", &self.name)
			.field("target", &format_args!("{:#x}", self.target))
			.field("replacement", &format_args!("{:#x}", self.replacement))
			.field("installed", &self.is_installed())
			.field("mem_protected", &self.is_memory_protected())
			.finish_non_exhaustive()
	}
}
