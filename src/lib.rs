//! Purpose: Shared library crate used by the `sqlitekvs` CLI, C hosts, and tests.
//! Exports: `api` (public surface), `core` (store, statements, values, errors), `abi`.
//! Role: A persistent key-value store over one SQLite table.
//! Invariants: Hosts should depend on `api`; `core` layout may change between releases.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod abi;
pub mod api;
pub mod core;
