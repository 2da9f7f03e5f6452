//! Remote repository store boundary.

pub mod contract;
pub mod http;
pub mod memory;

pub use contract::{RemoteContent, RemotePayload, RemoteStore};
pub use http::HttpRemoteStore;
pub use memory::MemoryRemote;
