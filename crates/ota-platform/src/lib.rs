//! Per-OS application directories for OTA hosts.

mod paths;

pub use paths::{AppPaths, AppPathsError, bundle_dir_in, update_dir_in};
