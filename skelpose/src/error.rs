use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown animation: {name}")]
    UnknownAnimation { name: String },

    #[error("unknown bone: {name}")]
    UnknownBone { name: String },

    #[error("unknown slot: {name}")]
    UnknownSlot { name: String },

    #[error("unknown skin: {name}")]
    UnknownSkin { name: String },

    #[error("unknown attachment '{name}' for slot '{slot}'")]
    UnknownAttachment { slot: String, name: String },

    #[error("unknown constraint: {name}")]
    UnknownConstraint { name: String },

    #[error("unknown event: {name}")]
    UnknownEvent { name: String },

    #[error("invalid value: {message}")]
    InvalidValue { message: String },
}

impl Error {
    pub(crate) fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue {
            message: message.into(),
        }
    }
}
