//! Capture-task orchestration: capabilities, task construction, execution and scheduling.

pub mod capture;
pub use capture::{CaptureBackend, CaptureEngine, OutputSink};

pub mod error;
pub use error::{CaptureError, SchedulerError, TimezoneError};

pub mod executor;
pub use executor::{ExecutionReport, ExecutionScope, StopReason, TaskFailure, run_tasks};

pub mod factory;
pub use factory::TaskFactory;

pub mod job;
pub use job::Job;

pub mod registry;
pub use registry::JobRegistry;

pub mod scheduler;
pub use scheduler::{
    CronSchedule, JobDefinition, JobHandle, JobRunner, Scheduler, SchedulerConfig, Trigger,
    resolve_location,
};

pub mod task;
pub use task::CaptureTask;
