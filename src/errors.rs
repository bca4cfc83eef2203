use thiserror::Error;

#[derive(Error, Debug)]
pub enum PilotError {
    #[error("{description} not found")]
    NotFound { description: String },

    #[error("{description} is not actionable. Check {checks} failed")]
    NotActionable { description: String, checks: String },

    #[error("Found too many matches for {description}. Please use a more specific selector")]
    Ambiguous { description: String },

    #[error("{description} is covered by other element")]
    Occluded { description: String },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Navigation took more than {timeout_ms}ms. Please increase the navigationTimeout")]
    NavigationTimeout { timeout_ms: u64 },

    #[error("Execution context is gone: {0}")]
    StaleContext(String),

    #[error("Browser process exited: {0}")]
    ProcessExited(String),

    #[error("{message}, waited for {timeout_ms}ms")]
    Timeout { message: String, timeout_ms: u64 },

    #[error("Error in page script: {message}\n{stack}")]
    PageScript { message: String, stack: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Anyhow error: {0}")]
    AnyhowError(String),
}

pub type Result<T> = std::result::Result<T, PilotError>;

// Convert anyhow::Error to PilotError
impl From<anyhow::Error> for PilotError {
    fn from(err: anyhow::Error) -> Self {
        PilotError::from_gateway_message(err.to_string())
    }
}

/// True when `message` reports that the browser process itself went away
/// ("Browser process ... exited").
pub fn is_process_exit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower
        .find("browser process")
        .map(|at| lower[at..].contains("exited"))
        .unwrap_or(false)
}

impl PilotError {
    /// Sorts a raw protocol failure into the taxonomy by its message.
    pub fn from_gateway_message(message: String) -> Self {
        if is_process_exit_message(&message)
            || message.contains("underlying connection is closed")
        {
            PilotError::ProcessExited(message)
        } else if message.contains("Cannot find context with specified id")
            || message.contains("Could not find object with given id")
            || message.contains("Execution context was destroyed")
            || message.contains("No node with given id")
        {
            PilotError::StaleContext(message)
        } else {
            PilotError::Gateway(message)
        }
    }

    /// The browser is gone; nothing upstream may retry.
    pub fn is_fatal(&self) -> bool {
        match self {
            PilotError::ProcessExited(_) => true,
            PilotError::Gateway(message) | PilotError::AnyhowError(message) => {
                is_process_exit_message(message)
            }
            _ => false,
        }
    }

    /// Errors that no amount of polling can fix.
    pub fn aborts_retry(&self) -> bool {
        self.is_fatal()
            || matches!(
                self,
                PilotError::UnsupportedOperation(_)
                    | PilotError::InvalidConfig(_)
                    | PilotError::InvalidSelector(_)
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_exit_messages_are_fatal() {
        let err = PilotError::Gateway("Browser process with pid 4242 exited.".into());
        assert!(err.is_fatal());
        assert!(err.aborts_retry());
        assert!(!PilotError::Gateway("Node is detached".into()).is_fatal());
    }

    #[test]
    fn gateway_messages_are_classified() {
        let stale = PilotError::from_gateway_message(
            "Method call error -32000: Cannot find context with specified id".into(),
        );
        assert!(matches!(stale, PilotError::StaleContext(_)));
        assert!(!stale.aborts_retry());

        let closed = PilotError::from_gateway_message(
            "Unable to make method calls because underlying connection is closed".into(),
        );
        assert!(closed.is_fatal());
    }

    #[test]
    fn unsupported_operation_stops_retries_but_is_not_fatal() {
        let err = PilotError::UnsupportedOperation("file input".into());
        assert!(err.aborts_retry());
        assert!(!err.is_fatal());
    }
}
