pub mod common;
pub mod discard;
pub mod enqueue;
pub mod list;
pub mod purge;
pub mod resolve;
pub mod retry;
pub mod status;
pub mod sync;
