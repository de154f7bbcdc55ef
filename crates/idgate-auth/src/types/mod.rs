//! Core domain types.

pub mod client;

pub use client::RegisteredClient;
