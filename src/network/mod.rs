//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread
//! - One worker thread per connection, bounded by `max_connections`
//! - PUT/GET content streamed straight between socket and storage
//! - Other commands routed through `FileStorage::execute`

mod client;
mod connection;
mod server;

pub use client::Client;
pub use connection::Connection;
pub use server::Server;
