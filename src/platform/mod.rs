//! Platform abstraction layer
//!
//! This module provides platform-specific implementations for:
//! - Process table listing
//! - Port listener lookup
//! - Process termination
//!
//! Only POSIX-like hosts are supported; listener lookup relies on `lsof`.

#[cfg(unix)]
pub mod unix;

// Re-export the current platform's modules
#[cfg(unix)]
pub use unix as current;

#[cfg(not(unix))]
compile_error!("prodh requires a POSIX-like host with `ps`, `lsof` and kill(2)");
