use serde::Serialize;
use std::fmt;

use crate::error::ErrorKind;

/// States a request passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Validating,
    Acquiring,
    Decoding,
    Transforming,
    Encoding,
    Storing,
    CleaningUp,
    Done,
    Failed(ErrorKind),
}

impl Stage {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validating => f.write_str("validating"),
            Self::Acquiring => f.write_str("acquiring"),
            Self::Decoding => f.write_str("decoding"),
            Self::Transforming => f.write_str("transforming"),
            Self::Encoding => f.write_str("encoding"),
            Self::Storing => f.write_str("storing"),
            Self::CleaningUp => f.write_str("cleaning-up"),
            Self::Done => f.write_str("done"),
            Self::Failed(kind) => write!(f, "failed({kind})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Stage::CleaningUp.to_string(), "cleaning-up");
        assert_eq!(
            Stage::Failed(ErrorKind::WrongCredential).to_string(),
            "failed(WrongCredential)"
        );
    }

    #[test]
    fn test_terminal() {
        assert!(Stage::Done.is_terminal());
        assert!(Stage::Failed(ErrorKind::Cancelled).is_terminal());
        assert!(!Stage::Storing.is_terminal());
    }
}
