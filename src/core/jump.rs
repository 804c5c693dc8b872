//! Absolute-jump generation
//!
//! Every patch this crate writes is the same fixed-width sequence: load a
//! 64-bit address into a scratch register, then jump through it. Keeping the
//! footprint constant means the override lifecycle never has to reason about
//! instruction lengths.

/// Total length of a generated jump, in bytes.
///
/// Callers clobber exactly this many bytes at the patch site and must save
/// exactly this many to undo it.
pub const JUMP_SIZE: usize = 12;

// The 64-bit operand starts right after the two-byte movabs opcode.
const JUMP_ADDR_OFFSET: usize = 2;

// movabs imm64, %rax; jmp *%rax
const JUMP_TEMPLATE: [u8; JUMP_SIZE] = [
	0x48, 0xb8, // movabs imm64, %rax
	0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
	0xff, 0xe0, // jmp *%rax
];

/// Build the jump sequence that transfers control to `target`.
///
/// Pure and deterministic: the same target always yields the same bytes, and
/// the output length is [`JUMP_SIZE`] for every possible address.
#[must_use]
pub fn build_jump(target: usize) -> [u8; JUMP_SIZE] {
	let mut jump = JUMP_TEMPLATE;
	jump[JUMP_ADDR_OFFSET..JUMP_ADDR_OFFSET + 8].copy_from_slice(&(target as u64).to_le_bytes());
	jump
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn output_is_fixed_width() {
		// the array type already pins the length; check the opcode framing
		// survives any operand, including addresses with the high bit set
		for target in [0usize, 1, 0xdead_beef, usize::MAX, 0xffff_8000_0000_0000] {
			let jump = build_jump(target);
			assert_eq!(&jump[..2], &[0x48, 0xb8]);
			assert_eq!(&jump[10..], &[0xff, 0xe0]);
		}
	}

	#[test]
	fn operand_is_little_endian_target() {
		let jump = build_jump(0x1122_3344_5566_7788);
		assert_eq!(&jump[2..10], &[0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]);
	}

	#[test]
	fn same_target_same_bytes() {
		assert_eq!(build_jump(0xcafe_f00d), build_jump(0xcafe_f00d));
	}
}
