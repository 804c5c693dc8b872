//! Symbol resolution
//!
//! Overrides bind to symbols by name at runtime, so every entry point into
//! the engine starts at a [`SymbolResolver`]. Resolution failure is an
//! explicit `None`, never a null address smuggled through as a value.

use std::collections::HashMap;
use std::ffi::CString;
use tracing::trace;

/// Trait for name-to-address lookup services
pub trait SymbolResolver: Send + Sync {
	/// Look up the runtime address of `name`.
	///
	/// Returns `None` if the symbol is unknown. Implementations must never
	/// report a found symbol at address zero.
	fn resolve(&self, name: &str) -> Option<usize>;
}

/// Resolver backed by the process's live symbol service.
///
/// Delegates to `dlsym` over the global namespace, which covers every symbol
/// exported by the main image and its loaded libraries.
#[derive(Debug, Default)]
pub struct DlsymResolver;

impl DlsymResolver {
	/// Create a new `DlsymResolver`
	#[must_use]
	pub const fn new() -> Self {
		Self
	}
}

impl SymbolResolver for DlsymResolver {
	fn resolve(&self, name: &str) -> Option<usize> {
		let Ok(name_c) = CString::new(name) else {
			return None;
		};

		let addr = unsafe { libc::dlsym(libc::RTLD_DEFAULT, name_c.as_ptr()) };
		if addr.is_null() {
			trace!("resolve: no address for {name}");
			None
		} else {
			trace!("resolve: {name} -> {:#x}", addr as usize);
			Some(addr as usize)
		}
	}
}

/// Resolver serving a fixed name-to-address map.
///
/// Used when the symbol table is built ahead of time (an embedded symbol
/// blob, or a test rig that plants targets in memory it owns).
#[derive(Debug, Default)]
pub struct FixedResolver {
	symbols: HashMap<String, usize>,
}

impl FixedResolver {
	/// Create an empty `FixedResolver`
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Register `name` at `addr`.
	///
	/// # Panics
	///
	/// Panics if `addr` is zero; a null address would be indistinguishable
	/// from a failed lookup.
	pub fn insert(&mut self, name: impl Into<String>, addr: usize) -> &mut Self {
		assert_ne!(addr, 0, "a symbol cannot live at address zero");
		self.symbols.insert(name.into(), addr);
		self
	}
}

impl SymbolResolver for FixedResolver {
	fn resolve(&self, name: &str) -> Option<usize> {
		self.symbols.get(name).copied()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn dlsym_finds_libc_exports() {
		let resolver = DlsymResolver::new();
		assert!(resolver.resolve("getpid").is_some());
		assert_eq!(resolver.resolve("definitely_not_a_symbol_7f3a"), None);
	}

	#[test]
	fn fixed_map_round_trips() {
		let mut resolver = FixedResolver::new();
		resolver.insert("alpha", 0x1000).insert("beta", 0x2000);
		assert_eq!(resolver.resolve("alpha"), Some(0x1000));
		assert_eq!(resolver.resolve("beta"), Some(0x2000));
		assert_eq!(resolver.resolve("gamma"), None);
	}

	#[test]
	#[should_panic(expected = "address zero")]
	fn fixed_map_rejects_null_addresses() {
		FixedResolver::new().insert("null", 0);
	}
}
