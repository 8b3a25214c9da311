use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The inbound message itself was unusable (blank text).
    #[error(transparent)]
    Input(#[from] pelangi_common::Error),

    #[error(transparent)]
    Config(#[from] pelangi_config::Error),

    #[error(transparent)]
    Sessions(#[from] pelangi_sessions::Error),

    #[error(transparent)]
    Workflow(#[from] pelangi_workflow::WorkflowError),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

impl pelangi_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pelangi_common::impl_context!();
