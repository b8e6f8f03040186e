//! Canonical record model shared by every import path.
//!
//! - [`Entry`] - one bibliographic record: type tag plus case-insensitive field map
//! - [`EntryTypeRegistry`] - injectable registry of known entry types
//! - [`ParseResult`] - ordered entries plus deduplicated warnings and metadata
//! - [`FieldChange`] - field-level diff used by callers that keep an undo log

mod change;
mod entry;
mod entry_type;
mod result;

pub use change::{FieldChange, OverwritePolicy};
pub use entry::{Entry, EntryId};
pub use entry_type::{DEFAULT_ENTRY_TYPE, EntryType, EntryTypeRegistry};
pub use result::{FetchResult, ParseResult};
