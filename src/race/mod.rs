pub mod publisher;
pub mod reader;
pub mod telemetry;
pub mod types;
