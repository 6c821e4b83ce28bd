//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: SQLite-backed `LocalStore` using Diesel
//! - **memory**: in-process `LocalStore` for tests and ephemeral clients
//! - **http**: reqwest-backed `StoryRemote` and a reachability probe
//!
//! Adapters are thin translators between domain types and infrastructure
//! representations. They contain no business logic.

pub mod http;
pub mod memory;
pub mod persistence;
