//! Application layer use cases for the share manager.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure rules in `smbshare-core`) and the infrastructure (files, processes).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** domain objects to fulfil an administrator's goal (e.g.,
//!   "add a share, keep a backup, and make the service pick it up").
//! - **Depend on abstractions** (traits) rather than concrete implementations,
//!   so the file store and the service controller can be faked in tests.
//! - **Contain no OS calls** of their own.
//!
//! # Sub-modules
//!
//! - **`manage_shares`** – [`manage_shares::ShareManager`], the CRUD contract.
//!   Every mutation runs read → validate → plan → backup → atomic write →
//!   reconcile as one critical section.
//!
//! - **`reconcile_service`** – The [`reconcile_service::ServiceReconciler`]
//!   capability used after every committed write, plus the status types the
//!   read-only status query returns.

pub mod manage_shares;
pub mod reconcile_service;
