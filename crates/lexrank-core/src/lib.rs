pub mod chunk;
pub mod config;
pub mod error;
pub mod filter;
pub mod registry;
pub mod schema;
pub mod space;
pub mod traits;
pub mod types;

pub use error::{BackendError, Error, Result};
pub use registry::{SpaceHandle, SpaceRegistry};
