//! JobRelay Client
//!
//! Submits jobs to a coordinator and waits for their outcome.

pub mod client;

pub use client::JobRelayClient;
