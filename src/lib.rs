//! Shoplist reference server.
//!
//! Library half of the `shoplist-server` binary, exposed so clients can run
//! the real router in their tests.

pub mod server;
