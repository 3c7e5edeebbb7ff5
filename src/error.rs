use std::fmt;

#[derive(Debug)]
pub enum PaginatorError {
    MissingContentRoot,
    NoContentRegistered,
    Measurement(String),
    InvalidConfiguration(String),
    Io(std::io::Error),
}

impl fmt::Display for PaginatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaginatorError::MissingContentRoot => {
                write!(f, "no extracted content found; process the HTML first")
            }
            PaginatorError::NoContentRegistered => {
                write!(f, "no content registered; process the HTML before paginating")
            }
            PaginatorError::Measurement(message) => write!(f, "measurement failed: {}", message),
            PaginatorError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            PaginatorError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for PaginatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PaginatorError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PaginatorError {
    fn from(value: std::io::Error) -> Self {
        PaginatorError::Io(value)
    }
}
