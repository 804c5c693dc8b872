//! Error types for the override engine
//!
//! Every fatal condition is reported to the immediate caller; nothing is
//! retried, since retrying a partially applied code patch is unsafe.

use crate::core::table::SYSCALL_TABLE_ENTRIES;
use thiserror::Error;

/// Result type for override operations
pub type Result<T> = std::result::Result<T, HookError>;

/// Error type for override operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
	/// The requested symbol is unknown to the resolver
	#[error("symbol `{0}` could not be resolved")]
	SymbolNotFound(String),

	/// Neither direct lookup nor the fallback scan produced a table base
	#[error("the syscall dispatch table could not be located")]
	TableNotFound,

	/// The syscall number lies outside the dispatch table
	#[error("invalid syscall number {nr} (the dispatch table holds {max} entries)", nr = .0, max = SYSCALL_TABLE_ENTRIES)]
	InvalidSyscallNumber(usize),

	/// No ground-truth pointer was ever captured for this syscall number
	#[error("syscall {0} was never overridden")]
	NotOverridden(usize),
}

impl HookError {
	/// The negative errno this failure maps to.
	///
	/// Useful when the caller reports status through a C-style interface:
	/// resolution and location failures are addressing errors, bounds and
	/// registry misuse are invalid arguments.
	#[must_use]
	pub const fn errno(&self) -> i32 {
		match self {
			Self::SymbolNotFound(_) | Self::TableNotFound => -libc::EFAULT,
			Self::InvalidSyscallNumber(_) | Self::NotOverridden(_) => -libc::EINVAL,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn errno_follows_the_kernel_convention() {
		assert_eq!(HookError::SymbolNotFound("nope".into()).errno(), -libc::EFAULT);
		assert_eq!(HookError::TableNotFound.errno(), -libc::EFAULT);
		assert_eq!(HookError::InvalidSyscallNumber(9999).errno(), -libc::EINVAL);
		assert_eq!(HookError::NotOverridden(1).errno(), -libc::EINVAL);
	}

	#[test]
	fn messages_name_the_offender() {
		let err = HookError::SymbolNotFound("sys_fnord".into());
		assert!(err.to_string().contains("sys_fnord"));
		let err = HookError::InvalidSyscallNumber(4096);
		assert!(err.to_string().contains("4096"));
	}
}
