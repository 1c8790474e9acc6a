use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    /// The WebDriver server could not start a browser session.
    #[error("Couldn't start browser session: {0}")]
    Session(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Element not found: {0}")]
    NotFound(String),

    #[error("WebDriver error: {0}")]
    WebDriver(String),

    #[error("Invalid selector '{0}'")]
    Selector(String),

    #[error("Unreadable row ({reason}): {text}")]
    Parse { text: String, reason: String },

    #[error("Invalid portal URL: {0}")]
    Url(#[from] url::ParseError),
}

pub type PortalResult<T> = Result<T, PortalError>;

impl PortalError {
    pub fn parse(text: &str, reason: &str) -> Self {
        PortalError::Parse {
            text: text.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Page loads and waits can succeed on a later attempt; bad selectors,
    /// unreadable rows and missing sessions cannot.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PortalError::Navigation { .. } | PortalError::Timeout(_) | PortalError::WebDriver(_)
        )
    }
}

impl From<fantoccini::error::CmdError> for PortalError {
    fn from(err: fantoccini::error::CmdError) -> Self {
        use fantoccini::error::CmdError;

        match err {
            CmdError::WaitTimeout => PortalError::Timeout("page element".to_string()),
            e if e.is_no_such_element() => PortalError::NotFound(e.to_string()),
            other => PortalError::WebDriver(other.to_string()),
        }
    }
}
