//! Tool implementations served over JSON-RPC

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;

use toolloop_core::logging::{Logger, SharedLogger};
use toolloop_core::tools::{BuiltinTool, ToolDescriptor};
use toolloop_core::{log_debug, log_warn};

/// AMap weather endpoint
pub const DEFAULT_WEATHER_URL: &str = "https://restapi.amap.com/v3/weather/weatherInfo";

fn str_arg<'a>(arguments: &'a Value, key: &str) -> &'a str {
    arguments.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Errors a tool handler reports back to the client
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {message}")]
    InvalidParams { tool: String, message: String },

    #[error("{0}")]
    Execution(String),
}

pub type HandlerResult<T> = Result<T, HandlerError>;

/// Uniform capability behind every tool the server hosts
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Tools advertised by `tools/list`
    fn descriptors(&self) -> Vec<ToolDescriptor>;

    /// Run one tool
    async fn call(&self, name: &str, arguments: Value) -> HandlerResult<Value>;
}

/// Weather API access
#[derive(Debug, Clone)]
pub struct WeatherSettings {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_WEATHER_URL.to_string(),
        }
    }
}

/// Handler for the built-in tool set
pub struct BuiltinHandler {
    http: reqwest::Client,
    weather: WeatherSettings,
    logger: SharedLogger,
}

impl BuiltinHandler {
    pub fn new(weather: WeatherSettings, logger: SharedLogger) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { http, weather, logger }
    }

    async fn get_weather(&self, city: &str) -> HandlerResult<Value> {
        let key = self
            .weather
            .api_key
            .as_deref()
            .ok_or_else(|| HandlerError::Execution("weather API key is not configured".to_string()))?;

        log_debug!(self.logger, "Fetching weather for {}", city);
        let response = self
            .http
            .get(&self.weather.base_url)
            .query(&[("city", city), ("key", key)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| HandlerError::Execution(format!("weather request failed: {}", e)))?;

        response
            .json::<Value>()
            .await
            .map_err(|e| HandlerError::Execution(format!("weather response is not JSON: {}", e)))
    }

    async fn run_shell(&self, command: &str) -> HandlerResult<Value> {
        log_debug!(self.logger, "Running shell command: {}", command);

        #[cfg(windows)]
        let mut process = {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        };
        #[cfg(not(windows))]
        let mut process = {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        };

        // The client may stop waiting; don't leave the child behind
        let output = process
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| HandlerError::Execution(format!("failed to start command: {}", e)))?;

        Ok(json!({
            "stdout": String::from_utf8_lossy(&output.stdout),
            "stderr": String::from_utf8_lossy(&output.stderr),
            "returncode": output.status.code(),
        }))
    }

    fn now_time() -> Value {
        json!({ "time": chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string() })
    }
}

#[async_trait]
impl ToolHandler for BuiltinHandler {
    fn descriptors(&self) -> Vec<ToolDescriptor> {
        BuiltinTool::ALL.iter().map(BuiltinTool::descriptor).collect()
    }

    async fn call(&self, name: &str, arguments: Value) -> HandlerResult<Value> {
        let tool = BuiltinTool::from_name(name).ok_or_else(|| HandlerError::UnknownTool(name.to_string()))?;

        tool.params()
            .validate(&arguments)
            .map_err(|message| HandlerError::InvalidParams {
                tool: name.to_string(),
                message,
            })?;

        let result = match tool {
            BuiltinTool::GetWeather => self.get_weather(str_arg(&arguments, "city")).await,
            BuiltinTool::RunShell => self.run_shell(str_arg(&arguments, "command")).await,
            BuiltinTool::NowTime => Ok(Self::now_time()),
        };

        if let Err(e) = &result {
            log_warn!(self.logger, "Tool {} failed: {}", name, e);
        }
        result
    }
}
