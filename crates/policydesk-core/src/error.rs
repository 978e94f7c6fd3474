use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("settings I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Misuse of a `ReferenceEditor`. Expected conditions (not-found, invalid
/// fields) are reported through the editor's status instead.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("{kind} form has no field named '{field}'")]
    UnknownField { kind: &'static str, field: String },
    #[error("{kind} form is locked while an existing {kind} is selected")]
    Locked { kind: &'static str },
    #[error("cannot load {kind} into the form: {source}")]
    Encode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
