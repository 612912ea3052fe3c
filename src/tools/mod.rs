pub mod args;
pub mod executor;
pub mod registry;
pub mod schema;

pub use args::{normalize, parse_invocations, ToolInvocation, DEFAULT_ALTITUDE};
pub use executor::ActionExecutor;
pub use registry::{ActionCatalog, ActionSpec};
