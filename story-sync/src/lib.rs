//! Offline-first story storage and synchronisation.
//!
//! Stories authored while offline are staged in a local pending-write queue
//! and drained against the remote story service once connectivity returns.
//! The crate is laid out hexagonally: [`domain`] holds records, services,
//! and ports; [`outbound`] holds the SQLite, in-memory, and HTTP adapters;
//! [`inbound`] holds the command-line surface; [`bootstrap`] wires them.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod inbound;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
