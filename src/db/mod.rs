//! Provides the persisted user store.
//!
//! `credentials` owns the JSON document and its repository backends; `preferences`
//! adds the validated preference operations on top of it.

mod credentials;
mod preferences;

pub use credentials::*;
pub use preferences::*;
