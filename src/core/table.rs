//! Syscall dispatch-table patching
//!
//! Unlike a symbol override, which clobbers the first bytes of a function,
//! patching a dispatch table swaps a single pointer-sized slot. The original
//! code stays intact and callable through the pointer captured at
//! override time.
//!
//! The table base is located lazily on the first override and cached for the
//! lifetime of the patcher. When the table's own symbol is not exported, the
//! locator falls back to a memory scan anchored on a handful of well-known
//! handler symbols; a single matching slot could be a coincidence, so a
//! candidate base is accepted only when all probe slots match at once.

use crate::core::mem;
use crate::error::{HookError, Result};
use crate::resolve::SymbolResolver;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace, warn};

/// Number of entries in the dispatch table; syscall numbers at or beyond
/// this bound are rejected.
pub const SYSCALL_TABLE_ENTRIES: usize = 512;

const TABLE_SYMBOL: &str = "sys_call_table";

/// Handler symbols present in every build, paired with the table slots
/// they occupy. Four simultaneous matches rule out coincidence.
const SCAN_PROBES: [(&str, usize); 4] = [
	("sys_read", 0),
	("sys_write", 1),
	("sys_open", 2),
	("sys_close", 3),
];

/// How far past the scan anchor the fallback search is willing to walk.
/// The table sits within ~14 MiB of the lowest handler on the layouts this
/// was measured against; 64 MiB leaves generous slack.
const SCAN_LIMIT_BYTES: usize = 64 << 20;

const SLOT_SIZE: usize = size_of::<usize>();

/// Patcher for a process-wide syscall dispatch table.
///
/// Keeps one ground-truth record per syscall number: the pointer observed in
/// the slot before the first override ever touched it. Repeated overrides of
/// the same number never displace that record, so a later
/// [`restore_entry`](Self::restore_entry) always reinstates the pre-override
/// handler.
pub struct SyscallPatcher {
	resolver: Box<dyn SymbolResolver>,
	base: OnceCell<usize>,
	// zero means "never captured"; the table never holds null handlers
	saved: [AtomicUsize; SYSCALL_TABLE_ENTRIES],
}

impl SyscallPatcher {
	/// Create a patcher that locates the table through `resolver`.
	#[must_use]
	pub fn new(resolver: Box<dyn SymbolResolver>) -> Self {
		Self {
			resolver,
			base: OnceCell::new(),
			saved: [const { AtomicUsize::new(0) }; SYSCALL_TABLE_ENTRIES],
		}
	}

	/// Point the slot for syscall `nr` at `new_ptr`, returning the
	/// ground-truth original pointer for that slot.
	///
	/// The first override of a number captures the slot's current pointer as
	/// ground truth. Overriding an already-overridden number is reported as
	/// a warning (it usually means a missing restore) and returns the
	/// original ground truth, not the intermediate pointer.
	///
	/// # Errors
	///
	/// [`HookError::InvalidSyscallNumber`] if `nr` is out of bounds;
	/// [`HookError::TableNotFound`] if the table cannot be located.
	///
	/// # Safety
	///
	/// The located table must be the live dispatch table of this address
	/// space and `new_ptr` must be a handler with the correct ABI. Racing
	/// overrides of the same number are not serialized; that coordination
	/// belongs to the caller.
	pub unsafe fn override_entry(&self, nr: usize, new_ptr: usize) -> Result<usize> {
		if nr >= SYSCALL_TABLE_ENTRIES {
			warn!("table: invalid syscall number {nr} >= {SYSCALL_TABLE_ENTRIES}");
			return Err(HookError::InvalidSyscallNumber(nr));
		}

		let base = unsafe { self.base_or_locate() }?;
		unsafe { self.log_window(base, nr) };

		let current = unsafe { read_slot(base, nr) };
		if self.saved[nr].compare_exchange(0, current, Ordering::AcqRel, Ordering::Acquire).is_err() {
			warn!("table: syscall {nr} is already overridden, replacing again (missing restore?)");
		}
		let original = self.saved[nr].load(Ordering::Acquire);

		debug!("table: syscall {nr}: {current:#x} -> {new_ptr:#x}");
		unsafe { write_slot_protected(base, nr, new_ptr) };
		unsafe { self.log_window(base, nr) };

		Ok(original)
	}

	/// Write the ground-truth pointer captured for `nr` back into its slot.
	///
	/// The ground-truth record is kept, so restoring again later (after
	/// another override) still reinstates the pre-override handler.
	///
	/// # Errors
	///
	/// [`HookError::InvalidSyscallNumber`] if `nr` is out of bounds;
	/// [`HookError::TableNotFound`] if the table was never located;
	/// [`HookError::NotOverridden`] if no ground truth was ever captured
	/// for `nr` (the slot is left untouched).
	///
	/// # Safety
	///
	/// Same contract as [`override_entry`](Self::override_entry).
	pub unsafe fn restore_entry(&self, nr: usize) -> Result<usize> {
		if nr >= SYSCALL_TABLE_ENTRIES {
			warn!("table: invalid syscall number {nr} >= {SYSCALL_TABLE_ENTRIES}");
			return Err(HookError::InvalidSyscallNumber(nr));
		}

		let Some(&base) = self.base.get() else {
			warn!("table: restore of syscall {nr} requested but the table was never located");
			return Err(HookError::TableNotFound);
		};

		let original = self.saved[nr].load(Ordering::Acquire);
		if original == 0 {
			warn!("table: syscall {nr} cannot be restored, it was never overridden");
			return Err(HookError::NotOverridden(nr));
		}

		unsafe { self.log_window(base, nr) };
		debug!("table: syscall {nr}: restoring {original:#x}");
		unsafe { write_slot_protected(base, nr, original) };
		unsafe { self.log_window(base, nr) };

		Ok(original)
	}

	/// Restore every slot a ground truth was captured for.
	///
	/// Teardown helper: unwinds all overrides in one sweep and returns how
	/// many slots were written back.
	///
	/// # Safety
	///
	/// Same contract as [`override_entry`](Self::override_entry).
	pub unsafe fn restore_all(&self) -> usize {
		let mut restored = 0;
		for nr in 0..SYSCALL_TABLE_ENTRIES {
			if self.saved[nr].load(Ordering::Acquire) != 0 && unsafe { self.restore_entry(nr) }.is_ok() {
				restored += 1;
			}
		}
		if restored > 0 {
			debug!("table: restored {restored} slot(s)");
		}
		restored
	}

	/// Whether a ground-truth pointer has been captured for `nr`.
	#[must_use]
	pub fn is_overridden(&self, nr: usize) -> bool {
		nr < SYSCALL_TABLE_ENTRIES && self.saved[nr].load(Ordering::Acquire) != 0
	}

	/// The cached table base, locating it first if necessary.
	unsafe fn base_or_locate(&self) -> Result<usize> {
		self.base.get_or_try_init(|| unsafe { self.locate() }).copied()
	}

	/// Find the dispatch table: direct symbol lookup, then bounded scan.
	unsafe fn locate(&self) -> Result<usize> {
		if let Some(addr) = self.resolver.resolve(TABLE_SYMBOL) {
			debug!("table: {TABLE_SYMBOL} found @ {addr:#x} via symbol lookup");
			return Ok(addr);
		}
		debug!("table: {TABLE_SYMBOL} is not exported, falling back to a memory scan");

		let mut probes = [(0usize, 0usize); SCAN_PROBES.len()];
		for (i, &(name, nr)) in SCAN_PROBES.iter().enumerate() {
			let Some(addr) = self.resolver.resolve(name) else {
				warn!("table: probe symbol {name} cannot be resolved, scan aborted");
				return Err(HookError::TableNotFound);
			};
			probes[i] = (addr, nr);
		}

		// the table lives above its handlers; the lowest one is the
		// earliest possible base
		let anchor = probes.iter().map(|&(addr, _)| addr).fold(usize::MAX, usize::min);
		debug!("table: scanning upward from {anchor:#x}");

		for offset in (0..SCAN_LIMIT_BYTES).step_by(SLOT_SIZE) {
			let candidate = anchor + offset;
			if probes.iter().all(|&(handler, nr)| unsafe { read_slot(candidate, nr) } == handler) {
				debug!("table: dispatch table found @ {candidate:#x} (anchor +{offset:#x})");
				return Ok(candidate);
			}
		}

		warn!("table: scan exhausted after {SCAN_LIMIT_BYTES:#x} bytes");
		Err(HookError::TableNotFound)
	}

	/// Trace the slots around `nr`, mirroring what a patch is about to
	/// change or just changed.
	unsafe fn log_window(&self, base: usize, nr: usize) {
		if !tracing::enabled!(tracing::Level::TRACE) {
			return;
		}
		let lo = nr.saturating_sub(2);
		let hi = (nr + 3).min(SYSCALL_TABLE_ENTRIES);
		for i in lo..hi {
			trace!("table: #{i:03} -> {:#x}", unsafe { read_slot(base, i) });
		}
	}
}

impl fmt::Debug for SyscallPatcher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let captured = self.saved.iter().filter(|slot| slot.load(Ordering::Relaxed) != 0).count();
		f.debug_struct("SyscallPatcher")
			.field("base", &self.base.get().map(|addr| format!("{addr:#x}")))
			.field("captured", &captured)
			.finish_non_exhaustive()
	}
}

fn slot_addr(base: usize, nr: usize) -> usize {
	base + nr * SLOT_SIZE
}

unsafe fn read_slot(base: usize, nr: usize) -> usize {
	unsafe { (slot_addr(base, nr) as *const usize).read_volatile() }
}

/// Swap one pointer-sized cell under a writable window covering just that
/// cell.
unsafe fn write_slot_protected(base: usize, nr: usize, value: usize) {
	let addr = slot_addr(base, nr);
	unsafe {
		mem::make_writable(addr, SLOT_SIZE);
		(addr as *mut usize).write_volatile(value);
		mem::make_read_only(addr, SLOT_SIZE);
	}
}
