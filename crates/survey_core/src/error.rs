use thiserror::Error;

/// Every rule an [`ObserverNote`](crate::ObserverNote) broke, in check order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Validation failed: {}", .0.join("; "))]
pub struct ValidationError(pub Vec<String>);

impl ValidationError {
    pub fn messages(&self) -> &[String] {
        &self.0
    }
}

/// A string that does not name any variant of a closed vocabulary enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
