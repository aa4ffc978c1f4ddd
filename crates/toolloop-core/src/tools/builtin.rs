//! The closed set of tools the bundled tool server implements

use std::time::Duration;

use super::registry::{ToolDescriptor, ToolHandle};
use super::schema::{ParamSchema, ParamSpec, ParamType};

/// Built-in tool, one variant per capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinTool {
    /// Weather lookup by city
    GetWeather,
    /// Shell command execution
    RunShell,
    /// Current local time
    NowTime,
}

impl BuiltinTool {
    pub const ALL: [BuiltinTool; 3] = [BuiltinTool::GetWeather, BuiltinTool::RunShell, BuiltinTool::NowTime];

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinTool::GetWeather => "get_weather",
            BuiltinTool::RunShell => "run_shell",
            BuiltinTool::NowTime => "now_time",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            BuiltinTool::GetWeather => "Get the current weather for a city",
            BuiltinTool::RunShell => "Execute a shell command and return stdout, stderr and the exit code",
            BuiltinTool::NowTime => "Get the current local date and time",
        }
    }

    pub fn params(&self) -> ParamSchema {
        match self {
            BuiltinTool::GetWeather => ParamSchema::new(vec![ParamSpec::required("city", ParamType::String)
                .with_description("City name or city code")]),
            BuiltinTool::RunShell => ParamSchema::new(vec![ParamSpec::required("command", ParamType::String)
                .with_description("The command line to execute")]),
            BuiltinTool::NowTime => ParamSchema::empty(),
        }
    }

    /// Client-side timeout; shell commands may legitimately run long
    pub fn default_timeout(&self) -> Duration {
        match self {
            BuiltinTool::GetWeather => Duration::from_secs(15),
            BuiltinTool::RunShell => Duration::from_secs(60),
            BuiltinTool::NowTime => Duration::from_secs(5),
        }
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(self.name(), self.description(), self.params())
            .with_handle(ToolHandle::new(self.name()).with_timeout(self.default_timeout()))
    }
}
