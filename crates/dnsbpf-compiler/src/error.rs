/// Error type for pattern compilation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("At least one domain name required")]
    NoPatterns,
    #[error("Empty domain name: {0:?}")]
    EmptyDomain(String),
    #[error("Label {label:?} is {len} bytes, longer than a length prefix can hold")]
    LabelTooLong { label: String, len: usize },
}
