//! Errors raised while building model values

/// Model construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Unknown source kind name
    #[error("unknown source kind: {0}")]
    UnknownSourceKind(String),

    /// Unknown raw key name
    #[error("unknown raw key: {0}")]
    UnknownRawKey(String),

    /// Reference built without any field spelling
    #[error("reference from '{construct}' carries no field key")]
    MissingKey {
        /// Construct that produced the reference
        construct: String,
    },

    /// Key present but empty
    #[error("empty value for {key} in reference from '{construct}'")]
    EmptyKey {
        /// Offending key
        key: &'static str,
        /// Construct that produced the reference
        construct: String,
    },
}
