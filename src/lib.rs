#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod delta;
pub mod dump;
mod error;
pub mod flatten;
pub mod layout;
pub mod model;
pub mod runtime;
pub mod snapshot;

pub use error::GraphError;

#[cfg(feature = "cli")]
pub use cli::run;
