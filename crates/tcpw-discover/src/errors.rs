use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("failed to list interfaces: {0}")]
    Enumerate(String),

    #[error("interface '{name}' not found: {reason}")]
    NotFound { name: String, reason: String },

    #[error("invalid interface pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
