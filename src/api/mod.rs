//! Purpose: Define the stable public Rust API boundary for sqlitekvs.
//! Exports: Store types, the `KeyValueStore` trait and helpers, the in-memory store, codecs.
//! Role: Public, additive-only surface used by the CLI, the C ABI, and Rust hosts.
//! Invariants: Core modules stay reachable for tests but hosts should import from here.
//! Invariants: Every implementation of `KeyValueStore` reports absence as `Ok(None)`.

mod codec;
mod kv;
mod memory;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::schema::TextEncoding;
pub use crate::core::sql::{RowControl, SqlRow, SqlSummary};
pub use crate::core::statement::{StatementKind, StatementState};
pub use crate::core::store::{JournalMode, Store, StoreOptions};
pub use crate::core::value::{Value, ValueKind, ValueView};
pub use codec::{JsonCodec, TextCodec};
pub use kv::{KeyValueExt, KeyValueStore};
pub use memory::MemoryStore;
