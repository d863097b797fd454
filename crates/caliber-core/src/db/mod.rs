//! Local database layer for the durable queue

mod connection;
mod migrations;

pub use connection::Database;
