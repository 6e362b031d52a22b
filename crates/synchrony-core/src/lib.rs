//! Synchrony Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `FileSignature`, `Tombstone`, `ChangeRecord`, `Operation`
//! - **Validated newtypes** - `SyncPath`, `ContentHash`, `RunId`
//! - **Port definitions** - Traits for adapters: `IStorageBackend`,
//!   `ILocalFileSystem`, `IStateStore`, `IDecisionProvider`
//! - **Configuration** - YAML-backed [`config::Config`]
//!
//! # Architecture
//!
//! The domain module is pure data with no I/O. Ports define the trait
//! interfaces that adapter crates implement; the sync engine only ever
//! talks to storage, the local tree, persisted state and the user through
//! these traits.

pub mod config;
pub mod domain;
pub mod ports;
