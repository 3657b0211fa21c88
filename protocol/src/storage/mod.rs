//! # Storage Module
//!
//! Collection-oriented persistence for contracts, collateral balances and
//! key material.
//!
//! ```text
//! store.rs: Store trait, WriteBatch, typed RecordExt helpers
//! memory.rs: MemoryStore, for tests
//! db.rs: SledStore, the on-disk backend
//! ```
//!
//! Records are bincode on disk. JSON is for the CLI's output only.

pub mod db;
pub mod memory;
pub mod store;

pub use db::SledStore;
pub use memory::MemoryStore;
pub use store::{RecordExt, Store, StoreError, StoreResult, WriteBatch, WriteOp};
