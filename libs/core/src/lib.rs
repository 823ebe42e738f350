//! Chatmart core contracts and value types.
//!
//! This crate exposes the data structures shared between the bot gateway,
//! the cart store, and the order service: integer-cent money, cart lines,
//! orders and their status machine, the decoded platform update envelope,
//! and the error taxonomy.

pub mod admin;
pub mod error;
pub mod money;
pub mod order;
pub mod status;
pub mod types;
pub mod update;

pub use admin::*;
pub use error::*;
pub use money::*;
pub use order::*;
pub use status::*;
pub use types::*;
pub use update::*;
