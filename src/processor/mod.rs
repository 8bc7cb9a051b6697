//! Result processors.
//!
//! Each statement's rows stream into a [`RowSink`](crate::db::RowSink):
//! [`MainProcessor`] for main statements, [`ReferenceProcessor`] for
//! reference statements. Both queue into the shared
//! [`ResultCache`](crate::cache::ResultCache) and flush at a row threshold
//! and when the statement ends.

pub mod decode;
pub mod main;
pub mod reference;

pub use main::MainProcessor;
pub use reference::ReferenceProcessor;
