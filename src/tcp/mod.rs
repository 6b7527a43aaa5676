//! Loopback TCP control layer.
//!
//! Accepts line-framed commands from local clients and routes them to the
//! dispatcher. One worker task per connection; replies are written back on
//! the same connection before the next request is read.

pub mod server;
