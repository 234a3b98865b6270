//! Shared data model of the capture sidecar.
//!
//! Everything here is plain data: capture descriptions, host devices, decoded records
//! and the identities used to correlate log events with jobs and executions.

mod capture;
pub use capture::{CaptureConfig, CaptureFormat, CaptureSettings};

mod correlation;
pub use correlation::{Correlation, JobSnapshot};

mod device;
pub use device::Device;

mod ids;
pub use ids::{ExecutionId, JobId};

mod record;
pub use record::CaptureRecord;

/// Free-form deployment label attached to a job (project, service, region, ...).
pub type Tag = String;
