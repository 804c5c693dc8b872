//! Shared utilities
//!
//! This module contains the ambient plumbing used by the patching
//! machinery: logging setup, page arithmetic and spin-based locking.

pub mod logging;
pub mod memory;
pub mod sync;

pub use logging::init_logging;
