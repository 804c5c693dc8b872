//! Override lifecycle tests
//!
//! These tests run the full patch cycle against a synthetic code page mapped
//! by the test itself: a tiny function is planted on an RX page, overridden,
//! executed, and restored. Nothing outside the mapped page is touched.

use symhook_rs::{FixedResolver, HookError, JUMP_SIZE, SymbolOverride, build_jump};

// mov eax, 11; ret
const STUB_CODE: [u8; 6] = [0xb8, 0x0b, 0x00, 0x00, 0x00, 0xc3];
const STUB_RESULT: i32 = 11;
const REPLACEMENT_RESULT: i32 = 42;

extern "C" fn replacement_fn() -> i32 {
	REPLACEMENT_RESULT
}

/// Map one page, plant the stub function at its start and seal it RX, the
/// way code pages normally are.
fn map_stub() -> usize {
	unsafe {
		let page = libc::sysconf(libc::_SC_PAGESIZE) as usize;
		let addr = libc::mmap(
			std::ptr::null_mut(),
			page,
			libc::PROT_READ | libc::PROT_WRITE,
			libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
			-1,
			0,
		);
		assert_ne!(addr, libc::MAP_FAILED, "mmap failed");
		std::ptr::copy_nonoverlapping(STUB_CODE.as_ptr(), addr.cast::<u8>(), STUB_CODE.len());
		assert_eq!(libc::mprotect(addr, page, libc::PROT_READ | libc::PROT_EXEC), 0);
		addr as usize
	}
}

fn resolver_for(addr: usize) -> FixedResolver {
	let mut resolver = FixedResolver::new();
	resolver.insert("stub_target", addr);
	resolver
}

fn read_patch_site(addr: usize) -> [u8; JUMP_SIZE] {
	let mut bytes = [0u8; JUMP_SIZE];
	unsafe { std::ptr::copy_nonoverlapping(addr as *const u8, bytes.as_mut_ptr(), JUMP_SIZE) };
	bytes
}

unsafe fn call(addr: usize) -> i32 {
	let f: extern "C" fn() -> i32 = unsafe { std::mem::transmute(addr) };
	f()
}

#[test]
fn enable_writes_the_jump_and_disable_restores_the_snapshot() {
	symhook_rs::util::init_logging();
	let target = map_stub();
	let before = read_patch_site(target);

	let resolver = resolver_for(target);
	let sym = SymbolOverride::new(&resolver, "stub_target", replacement_fn as usize).unwrap();
	assert_eq!(sym.original_address(), target);
	assert!(!sym.is_installed());

	unsafe { sym.enable() };
	assert!(sym.is_installed());
	assert_eq!(read_patch_site(target), build_jump(replacement_fn as usize));

	unsafe { sym.disable() };
	assert!(!sym.is_installed());
	assert_eq!(read_patch_site(target), before);
}

#[test]
fn patched_function_lands_in_the_replacement() {
	let target = map_stub();
	assert_eq!(unsafe { call(target) }, STUB_RESULT);

	let resolver = resolver_for(target);
	let sym = unsafe { symhook_rs::hook(&resolver, "stub_target", replacement_fn as usize) }.unwrap();
	assert!(sym.is_installed());
	assert_eq!(unsafe { call(target) }, REPLACEMENT_RESULT);

	unsafe { sym.restore() };
	assert_eq!(unsafe { call(target) }, STUB_RESULT);
}

#[test]
fn enable_and_disable_are_idempotent() {
	let target = map_stub();
	let before = read_patch_site(target);
	let resolver = resolver_for(target);
	let sym = SymbolOverride::new(&resolver, "stub_target", replacement_fn as usize).unwrap();

	// disabling a never-enabled override is a no-op
	unsafe { sym.disable() };
	assert_eq!(read_patch_site(target), before);

	unsafe { sym.enable() };
	let patched = read_patch_site(target);
	unsafe { sym.enable() };
	assert!(sym.is_installed());
	assert_eq!(read_patch_site(target), patched);
	assert!(sym.is_memory_protected());

	unsafe { sym.disable() };
	unsafe { sym.disable() };
	assert!(!sym.is_installed());
	assert_eq!(read_patch_site(target), before);
	assert!(sym.is_memory_protected());
}

#[test]
fn call_through_runs_the_original_and_reinstalls() {
	let target = map_stub();
	let resolver = resolver_for(target);
	let sym = unsafe { symhook_rs::hook(&resolver, "stub_target", replacement_fn as usize) }.unwrap();
	assert!(sym.is_memory_protected());

	let original_result = unsafe { sym.call_through(|addr| call(addr)) };
	assert_eq!(original_result, STUB_RESULT);

	// the hook is back in place, but the fast path left the page writable
	assert!(sym.is_installed());
	assert_eq!(unsafe { call(target) }, REPLACEMENT_RESULT);
	assert!(!sym.is_memory_protected());

	// repeated cycles keep working within the open window
	assert_eq!(unsafe { sym.call_through(|addr| call(addr)) }, STUB_RESULT);
	assert_eq!(unsafe { call(target) }, REPLACEMENT_RESULT);

	// the next public operation closes the window again
	unsafe { sym.enable() };
	assert!(sym.is_memory_protected());

	unsafe { sym.disable() };
	assert!(sym.is_memory_protected());
	assert_eq!(unsafe { call(target) }, STUB_RESULT);
}

#[test]
fn unknown_symbol_fails_creation() {
	let resolver = FixedResolver::new();
	let err = SymbolOverride::new(&resolver, "no_such_symbol", replacement_fn as usize).unwrap_err();
	assert_eq!(err, HookError::SymbolNotFound("no_such_symbol".into()));
	assert_eq!(err.errno(), -libc::EFAULT);
}

#[test]
fn dropping_while_installed_leaves_the_patch_live() {
	let target = map_stub();
	let resolver = resolver_for(target);
	{
		let sym = unsafe { symhook_rs::hook(&resolver, "stub_target", replacement_fn as usize) }.unwrap();
		assert!(sym.is_installed());
		// dropped without disable: caller error, the engine does not undo it
	}
	assert_eq!(read_patch_site(target), build_jump(replacement_fn as usize));
	assert_eq!(unsafe { call(target) }, REPLACEMENT_RESULT);
}

#[test]
fn independent_overrides_do_not_interfere() {
	let target_a = map_stub();
	let target_b = map_stub();
	let mut resolver = FixedResolver::new();
	resolver.insert("stub_a", target_a).insert("stub_b", target_b);

	let sym_a = unsafe { symhook_rs::hook(&resolver, "stub_a", replacement_fn as usize) }.unwrap();
	let sym_b = SymbolOverride::new(&resolver, "stub_b", replacement_fn as usize).unwrap();

	assert_eq!(unsafe { call(target_a) }, REPLACEMENT_RESULT);
	assert_eq!(unsafe { call(target_b) }, STUB_RESULT);

	unsafe { sym_b.enable() };
	unsafe { sym_a.disable() };
	assert_eq!(unsafe { call(target_a) }, STUB_RESULT);
	assert_eq!(unsafe { call(target_b) }, REPLACEMENT_RESULT);

	unsafe { sym_b.disable() };
	drop(sym_a);
	drop(sym_b);
}
