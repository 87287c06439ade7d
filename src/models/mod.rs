//! Defines the data structures and models used throughout the application.
//!
//! This includes the persisted user records, the headline/article records returned
//! by the network collaborators, and the raw RSS shapes they are mapped from.

mod news;
mod user;

pub use news::*;
pub use user::*;
