/// Errors when resolving or converting a property
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    /// A required property has no value after placeholder resolution
    #[error("Property '{key}' not found")]
    MissingProperty { key: String },
    /// No converter is registered for the requested target type
    #[error("Unsupported value type: '{0}'")]
    UnsupportedType(&'static str),
    /// The converter for the target type rejected the value
    #[error("Cannot convert '{value}' of property '{key}' to '{target}': {reason}")]
    ConversionFailed {
        key: String,
        value: String,
        target: &'static str,
        reason: String,
    },
    /// A stored value refers back to a key that is already being resolved
    #[error("Placeholder '{key}' refers back to itself through {chain:?}")]
    CircularPlaceholder { key: String, chain: Vec<String> },
}

/// Errors when trying to register a converter
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegisterConverterError {
    /// A converter for the target type is already registered
    #[error("A converter for '{0}' is already registered")]
    AlreadyRegistered(&'static str),
}
