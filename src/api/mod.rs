//! Provides clients for the external collaborators.
//!
//! Includes:
//! - `feeds`: RSS section feeds of the news site.
//! - `browser`: the browser-automation bridge used for full articles and search.

mod browser;
mod feeds;

pub use browser::*;
pub use feeds::*;
