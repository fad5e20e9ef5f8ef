//! Gateway collaborators: routing config reader, entry validation, and
//! external tool invocation.

mod config;
mod tool;
mod validate;

pub use config::{ConfigError, EntryKind, RoutingConfig, RoutingConfigLoader, RoutingEntry};
pub use tool::{GatewayInvoker, GatewayTool, ToolOutcome, DEFAULT_TOOL_TIMEOUT};
pub use validate::{
    is_valid_domain, is_valid_ipv4, is_valid_port, validate_proxy_entry, validate_service_entry,
    ValidationError,
};
