use std::fmt;

#[derive(Debug)]
pub enum CardstockError {
    Input(String),
    Render(String),
    Packaging(String),
}

impl CardstockError {
    // Input errors stop a run up front; everything else is captured per
    // record in the summary.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CardstockError::Input(_))
    }
}

impl fmt::Display for CardstockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardstockError::Input(message) => write!(f, "input error: {}", message),
            CardstockError::Render(message) => write!(f, "render error: {}", message),
            CardstockError::Packaging(message) => write!(f, "packaging error: {}", message),
        }
    }
}

impl std::error::Error for CardstockError {}
