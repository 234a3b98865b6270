/// Static deployment identifiers stamped on every journal entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub sidecar: String,
    pub module: String,
}

impl Identity {
    pub fn new(sidecar: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            sidecar: sidecar.into(),
            module: module.into(),
        }
    }

    /// Reads `APP_SIDECAR` and `PROC_NAME`; missing values become empty strings.
    pub fn from_env() -> Self {
        Self {
            sidecar: std::env::var("APP_SIDECAR").unwrap_or_default(),
            module: std::env::var("PROC_NAME").unwrap_or_default(),
        }
    }
}
