//! rawhttp - HTTP/1.1 over raw TCP
//!
//! Request parsing and response framing written directly against a byte
//! stream, plus a minimal accept loop to serve them.

pub mod config;
pub mod http;
pub mod routes;
pub mod server;

pub use server::{serve, Handler, Server};
