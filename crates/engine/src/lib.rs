//! Deterministic block building and fork-choice control for a rollup execution node.
//!
//! [`EngineApi`] plays the consensus-layer driver's counterpart: it reconciles
//! forkchoice updates against an [`EngineBackend`], opens a single in-flight
//! build through the [`BlockBuilder`], lets the driver include transactions one
//! at a time, and hands back sealed payloads. Nothing here is thread-safe;
//! callers serialize access.

mod api;
pub use api::{EngineApi, invalid_status};

mod backend;
pub use backend::{EngineBackend, GasPool, GasPoolError, SetCanonicalError};

mod builder;
pub use builder::{BlockBuilder, Inclusion};

mod error;
pub use error::{BoxError, EngineError, ForkchoiceStateError};

mod payload_id;
pub use payload_id::compute_payload_id;
