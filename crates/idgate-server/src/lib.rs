pub mod config;
pub mod observability;
pub mod server;

pub use server::{IdgateServer, ServerBuilder, build_app};
