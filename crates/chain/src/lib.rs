//! In-memory execution backend for the Metis engine.
//!
//! Blocks, canonical index and state snapshots all live in memory, and
//! transactions are executed with revm on top of a [`revm::database::CacheDB`].
//! This is what tests and the scripted driver run the engine against.

mod backend;
pub use backend::InMemoryBackend;

mod error;
pub use error::ChainError;

mod executor;
pub use executor::{apply_transaction, state_root};

mod genesis;
pub use genesis::{Genesis, GenesisAccount};

mod storage;
pub use storage::{ChainStore, StateDB};
