//! Override a function inside the running process.
//!
//! The target lives in this binary's own text section, so it is registered
//! with a [`FixedResolver`] rather than looked up dynamically. Run with
//! `SYMHOOK_DEBUG=1` to watch the engine work.

use std::hint::black_box;
use symhook_rs::FixedResolver;

#[inline(never)]
extern "C" fn the_answer() -> u32 {
	41
}

#[inline(never)]
extern "C" fn better_answer() -> u32 {
	42
}

fn main() -> symhook_rs::Result<()> {
	symhook_rs::util::init_logging();

	let mut resolver = FixedResolver::new();
	resolver.insert("the_answer", the_answer as usize);

	let call_target = || {
		// read the pointer at runtime so the call goes through the patched
		// preamble instead of a constant-folded result
		let f: extern "C" fn() -> u32 = black_box(the_answer);
		f()
	};

	println!("before:            {}", call_target());

	let hook = unsafe { symhook_rs::hook(&resolver, "the_answer", better_answer as usize)? };
	println!("patched:           {}", call_target());

	let original = unsafe { hook.call_through(|addr| {
		let f: extern "C" fn() -> u32 = unsafe { std::mem::transmute(addr) };
		f()
	}) };
	println!("via call-through:  {original}");
	println!("still patched:     {}", call_target());

	unsafe { hook.restore() };
	println!("restored:          {}", call_target());

	Ok(())
}
