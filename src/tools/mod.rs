//! Remote tool discovery and dispatch.

mod executor;
mod registry;
pub mod testing;

pub use executor::{ToolError, ToolExecutor};
pub use registry::{DiscoveryError, ToolRegistry};
