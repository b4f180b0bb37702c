use thiserror::Error;

/// Failures of a workspace action that callers may want to match on.
///
/// Storage and parsing problems travel as `anyhow::Error`; these are the
/// domain refusals layered on top of them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceError {
    #[error("no active list is selected")]
    NoActiveList,

    #[error("unknown list: {0}")]
    UnknownList(String),

    #[error("task text is empty")]
    EmptyText,

    #[error("the task form is not open")]
    ModalClosed,

    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}
