//! # smbshare-core
//!
//! Domain library for smbshare: the in-memory model of a section-structured
//! share configuration file (Samba's `smb.conf`), the permissive parser that
//! builds it, the registry of managed shares, and the pure mutation planner
//! that turns add/update/delete requests into a new document.
//!
//! This crate has no dependencies on process control, the clock, or the
//! live configuration file.  The only outside fact the mutation planner needs
//! (does a share path exist?) is injected by the caller through
//! [`mutator::PathProbe`].
//!
//! # Architecture overview (for beginners)
//!
//! The configuration file is edited by people and by other tools, so the
//! system never tries to understand all of it.  Instead it splits the text
//! into *blocks* (one per `[section]` header), leaves every block it does not
//! manage untouched, and only interprets the handful of keys it owns:
//!
//! - **`document`** – The ordered list of blocks plus the preamble, with a
//!   lossless text round-trip.  `document::parser` turns text into a
//!   [`Document`] and extracts [`Share`] records from managed blocks.
//!
//! - **`share`** – The typed [`Share`] record, the [`ShareSpec`] used as
//!   operation input, name/field validation, and the [`ShareError`] taxonomy.
//!
//! - **`registry`** – [`ShareRegistry`], a name-indexed view of every managed
//!   share in document order.
//!
//! - **`mutator`** – [`Mutator`], which validates a request against the
//!   registry and produces the next [`Document`].

pub mod document;
pub mod mutator;
pub mod registry;
pub mod share;

pub use document::parser::{extract_share, parse};
pub use document::template::{default_document, DEFAULT_CONFIG};
pub use document::{is_reserved, Block, Document, RESERVED_SECTIONS};
pub use mutator::{Mutator, PathProbe};
pub use registry::ShareRegistry;
pub use share::{Share, ShareError, ShareSpec};
