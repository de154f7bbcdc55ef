//! Storage traits and the in-memory backends.

pub mod client;
pub mod code;
pub mod memory;

pub use client::ClientStorage;
pub use code::AuthorizationCodeStorage;
pub use memory::{InMemoryClientStorage, InMemoryCodeStorage};
