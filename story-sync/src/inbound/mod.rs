//! Inbound adapters driving the domain.
//!
//! - **cli**: clap command-line surface over the composed client services.

pub mod cli;
