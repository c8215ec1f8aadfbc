//! An HTTP action server which reacts to alert events, draining Kubernetes Nodes whose spot instances are about
//! to be terminated.
pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod resolver;
pub mod router;
mod telemetry;
