//! Durable port-mapping store for the simulated L1 matrix switch.
//!
//! This crate owns the only shared mutable resource of the test switch: one
//! YAML file per device recording which ports are cross-connected.
//!
//! - [`mapping`]: [`MappingValue`] and [`MappingSet`], the in-memory state
//! - [`lock`]: per-path exclusive locks ([`FileLocker`], [`InMemoryLocker`])
//! - [`store`]: [`MappingStore`] scoped transactions
//! - [`error`]: error types for store operations
//!
//! # Transactions
//!
//! Every access goes through a scoped transaction:
//!
//! 1. Acquire the exclusive lock for the store file (blocking)
//! 2. Read the file; missing, empty or corrupt content reads as an empty set
//! 3. Run the caller's closure against the in-memory [`MappingSet`]
//! 4. Roll back to the pre-closure snapshot if the closure failed
//! 5. Write the set back atomically and release the lock
//!
//! # Example
//!
//! ```no_run
//! use l1_mapping_store::{MappingStore, MappingValue, StoreError};
//!
//! let store = MappingStore::new();
//! store.transaction("192-168-42-240-mappings.yaml", |mappings| {
//!     mappings.insert("192.168.42.240/1/1", MappingValue::port("192.168.42.240/1/2"));
//!     Ok::<_, StoreError>(())
//! })?;
//! # Ok::<(), StoreError>(())
//! ```

pub mod error;
pub mod lock;
pub mod mapping;
pub mod store;

// Re-export commonly used items at crate root
pub use error::{StoreError, StoreResult};
#[cfg(unix)]
pub use lock::FileLocker;
pub use lock::{default_locker, InMemoryLocker, LockGuard, PathLocker};
pub use mapping::{MappingSet, MappingValue, EXCEPTION_MARKER};
pub use store::MappingStore;
