use crate::scene::Scene;

/// Result alias that carries the custom [`ShowError`] type.
pub type Result<T> = std::result::Result<T, ShowError>;

/// Common error type for the core crate.
///
/// None of these are fatal to a running show. Action methods surface them so
/// callers can tell a rejected action from an accepted one, and the
/// orchestrator itself only ever logs them.
#[derive(Debug, thiserror::Error)]
pub enum ShowError {
    /// Free-form message for failures without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration could not be parsed or serialised.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// A user action arrived in a scene that does not accept it.
    #[error("`{action}` is not accepted in scene `{scene}`")]
    InvalidAction { action: &'static str, scene: Scene },
    /// A branch path id that is not part of the configured content.
    #[error("unknown branch path `{0}`")]
    UnknownPath(String),
    /// The audio provider refused to start playback.
    #[error("playback failed: {0}")]
    Playback(String),
}

impl ShowError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn invalid_action(action: &'static str, scene: &Scene) -> Self {
        Self::InvalidAction {
            action,
            scene: scene.clone(),
        }
    }
}

impl From<&str> for ShowError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for ShowError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
