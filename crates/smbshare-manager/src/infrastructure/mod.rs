//! Infrastructure layer for the share manager.
//!
//! Contains the OS-facing adapters: the configuration file store, the
//! manager's own TOML settings, and the systemd service controller.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `smbshare_core`, but MUST NOT be imported by the `application` or domain
//! layers.

pub mod service;
pub mod storage;
