//! Message definitions for the arena protocol.
//!
//! Every message is a JSON object whose `type` field selects the variant.

mod client;
mod server;

pub use client::*;
pub use server::*;
