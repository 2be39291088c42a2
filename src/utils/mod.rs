//! Utility functions and helpers
//!
//! This module contains the atomic file publishing helpers shared by the
//! live store, the archive and the backup service.

pub mod atomic;

pub use atomic::{atomic_write, atomic_write_with, cleanup_temp_files, temp_path_for};
