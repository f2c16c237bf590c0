//! Shared filesystem utilities.

pub mod files;
pub mod temp;

pub use files::{copy_dir_all, write_file_with_dirs};
pub use temp::{cleanup_work_dir, prepare_work_dir, random_hex};
