//! Packet-capture sidecar: selects interfaces, builds capture tasks and runs them once
//! or on a cron schedule until the process is signalled.

pub mod cli;
pub use cli::Cli;

mod config;
pub use config::{RunConfig, deployment_tags, tags_from};

mod error;
pub use error::LifecycleError;

mod lifecycle;
pub use lifecycle::{BackendFactory, Lifecycle};

mod runner;
pub use runner::CaptureJobRunner;
