//! Scripted driver for the Metis engine.
//!
//! Loads a configuration, builds the genesis chain in memory and executes a
//! scenario of forkchoice, inclusion and sealing steps against it.

pub mod config;
pub mod scenario;
