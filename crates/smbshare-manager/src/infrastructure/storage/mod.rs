//! Storage infrastructure: everything that touches files on disk.
//!
//! - **`persister`** – [`persister::ConfFileStore`], the crash-safe reader and
//!   writer of the live share configuration.  Every write keeps a timestamped
//!   backup of the previous content and replaces the live file atomically.
//! - **`config`** – The manager's own TOML settings (file locations, backup
//!   retention, service units, log level), with defaults for first run.

pub mod config;
pub mod persister;
