//! Tool management module
//!
//! Tool descriptors, declared parameter schemas and the registry the
//! transport validates against before anything leaves the process.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  ToolRegistry                               │
//! │                                             │
//! │  - name → ToolDescriptor                    │
//! │  - validates arguments (required, types)    │
//! │  - provides tool schemas to the model       │
//! └─────────────────────────────────────────────┘
//!           │
//!           │ ToolHandle (remote name, timeout)
//!           ▼
//! ┌─────────────────────────────────────────────┐
//! │  ToolTransport → tool server                │
//! │    get_weather, run_shell, now_time         │
//! └─────────────────────────────────────────────┘
//! ```

mod builtin;
mod registry;
mod schema;

pub use builtin::BuiltinTool;
pub use registry::{RegistryError, RegistryResult, ToolDescriptor, ToolFilter, ToolHandle, ToolRegistry};
pub use schema::{ParamSchema, ParamSpec, ParamType};
