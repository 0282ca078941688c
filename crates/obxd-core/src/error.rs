//! Error types for the control bridge.

use std::path::PathBuf;

/// Resource and lifecycle failures.
///
/// None of these are fatal to an instance: a missing or malformed preset bank
/// leaves the instance running on its default patch.
#[derive(Debug)]
pub enum BridgeError {
    /// The preset bank file could not be read.
    BankUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The preset bank contains no embedded XML program list.
    MissingProgramList,
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BankUnreadable { path, source } => {
                write!(f, "cannot read preset bank {}: {source}", path.display())
            }
            Self::MissingProgramList => write!(f, "preset bank has no program list"),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::BankUnreadable { source, .. } => Some(source),
            Self::MissingProgramList => None,
        }
    }
}

impl BridgeError {
    /// Whether this is the ordinary "module ships no bank" case.
    pub fn is_missing_file(&self) -> bool {
        matches!(
            self,
            Self::BankUnreadable { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Control protocol failures reported by `set_param`.
///
/// `NotFound` is a lookup miss rather than a failure: hosts probe keys and
/// fall back to their own handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// No namespace recognises the key.
    NotFound,
    /// The key exists but cannot be written.
    ReadOnly,
    /// The value could not be parsed for this key.
    InvalidValue,
    /// The value parsed but addresses something that does not exist.
    OutOfRange,
}

impl std::fmt::Display for ParamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "unknown parameter key"),
            Self::ReadOnly => write!(f, "parameter is read-only"),
            Self::InvalidValue => write!(f, "invalid parameter value"),
            Self::OutOfRange => write!(f, "parameter value out of range"),
        }
    }
}

impl std::error::Error for ParamError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_detection() {
        let missing = BridgeError::BankUnreadable {
            path: PathBuf::from("presets/factory.fxb"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(missing.is_missing_file());
        assert!(!BridgeError::MissingProgramList.is_missing_file());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            BridgeError::MissingProgramList.to_string(),
            "preset bank has no program list"
        );
        assert_eq!(ParamError::ReadOnly.to_string(), "parameter is read-only");
    }
}
