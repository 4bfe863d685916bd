//! TCP accept loop and the handler seam.

pub mod handler;
pub mod listener;

pub use handler::Handler;
pub use listener::{serve, Server};
