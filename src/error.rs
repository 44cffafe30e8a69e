// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for drive compilation and effective-Hamiltonian extraction.

use std::fmt;
use std::path::PathBuf;

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate error types.
#[derive(Debug)]
pub enum Error {
    /// Configuration error
    Config(String),
    /// Drive sequence compilation error
    Drive(DriveError),
    /// Time-function algebra error
    Expression(ExpressionError),
    /// Linear algebra error
    Linalg(LinalgError),
    /// IO error
    Io(std::io::Error),
    /// Serialization error
    Serialization(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Drive(e) => write!(f, "Drive error: {}", e),
            Error::Expression(e) => write!(f, "Expression error: {}", e),
            Error::Linalg(e) => write!(f, "Linear algebra error: {}", e),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Drive(e) => Some(e),
            Error::Expression(e) => Some(e),
            Error::Linalg(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<DriveError> for Error {
    fn from(e: DriveError) -> Self {
        Error::Drive(e)
    }
}

impl From<ExpressionError> for Error {
    fn from(e: ExpressionError) -> Self {
        Error::Expression(e)
    }
}

impl From<LinalgError> for Error {
    fn from(e: LinalgError) -> Self {
        Error::Linalg(e)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Drive sequence compilation errors.
///
/// All of these abort the compilation; no partial coefficient is returned.
#[derive(Debug)]
pub enum DriveError {
    /// Instruction order violates the sequence contract
    Sequencing(String),
    /// Intervals cannot be merged into one coefficient representation
    TypeConsistency(String),
    /// Amplitude is not usable in the requested context
    UnsupportedAmplitude(String),
}

impl fmt::Display for DriveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveError::Sequencing(msg) => write!(f, "Sequencing error: {}", msg),
            DriveError::TypeConsistency(msg) => write!(f, "Type consistency error: {}", msg),
            DriveError::UnsupportedAmplitude(msg) => write!(f, "Unsupported amplitude: {}", msg),
        }
    }
}

impl std::error::Error for DriveError {}

/// Time-function algebra errors.
#[derive(Debug)]
pub enum ExpressionError {
    /// Wrong number of bound parameter values
    ParameterCount { expected: usize, got: usize },
    /// Text expression could not be parsed
    Parse { position: usize, message: String },
    /// Operand combination is not defined
    Incompatible(String),
    /// Text expression references a symbol with no bound value
    UnboundSymbol(String),
}

impl fmt::Display for ExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionError::ParameterCount { expected, got } => {
                write!(f, "Expected {} parameter values, got {}", expected, got)
            }
            ExpressionError::Parse { position, message } => {
                write!(f, "Parse error at position {}: {}", position, message)
            }
            ExpressionError::Incompatible(msg) => write!(f, "Incompatible operands: {}", msg),
            ExpressionError::UnboundSymbol(name) => write!(f, "Unbound symbol '{}'", name),
        }
    }
}

impl std::error::Error for ExpressionError {}

/// Linear algebra errors.
#[derive(Debug)]
pub enum LinalgError {
    /// Array shape does not match the operation
    Shape(String),
    /// Linear system has no unique solution
    Singular(String),
    /// Eigendecomposition did not converge
    Decomposition {
        /// Number of matrices in the offending batch
        batch_size: usize,
        /// Where the offending batch was written, if the capture succeeded
        capture: Option<PathBuf>,
    },
}

impl fmt::Display for LinalgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinalgError::Shape(msg) => write!(f, "Shape mismatch: {}", msg),
            LinalgError::Singular(msg) => write!(f, "Singular matrix: {}", msg),
            LinalgError::Decomposition {
                batch_size,
                capture: Some(path),
            } => write!(
                f,
                "Eigendecomposition failed for a batch of {} matrices (saved at {})",
                batch_size,
                path.display()
            ),
            LinalgError::Decomposition {
                batch_size,
                capture: None,
            } => write!(
                f,
                "Eigendecomposition failed for a batch of {} matrices (capture failed)",
                batch_size
            ),
        }
    }
}

impl std::error::Error for LinalgError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    // =========================================================================
    // Display
    // =========================================================================

    #[test]
    fn test_error_display_config() {
        let e = Error::Config("substeps must be > 0".into());
        assert_eq!(e.to_string(), "Configuration error: substeps must be > 0");
    }

    #[test]
    fn test_error_display_sequencing() {
        let e = Error::Drive(DriveError::Sequencing(
            "ShiftFrequency called before SetFrequency".into(),
        ));
        assert_eq!(
            e.to_string(),
            "Drive error: Sequencing error: ShiftFrequency called before SetFrequency"
        );
    }

    #[test]
    fn test_error_display_parameter_count() {
        let e = ExpressionError::ParameterCount {
            expected: 2,
            got: 1,
        };
        assert_eq!(e.to_string(), "Expected 2 parameter values, got 1");
    }

    #[test]
    fn test_error_display_decomposition() {
        let e = LinalgError::Decomposition {
            batch_size: 3,
            capture: Some(PathBuf::from("/tmp/batch.json")),
        };
        assert_eq!(
            e.to_string(),
            "Eigendecomposition failed for a batch of 3 matrices (saved at /tmp/batch.json)"
        );
    }

    // =========================================================================
    // source() and From impls
    // =========================================================================

    #[test]
    fn test_error_source_chains() {
        let e: Error = DriveError::TypeConsistency("x".into()).into();
        assert!(e.source().is_some());
        let e: Error = LinalgError::Shape("x".into()).into();
        assert!(e.source().is_some());
        let e = Error::Serialization("x".into());
        assert!(e.source().is_none());
    }

    #[test]
    fn test_from_serde_yaml_error() {
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>("{{{{").unwrap_err();
        let e: Error = yaml_err.into();
        assert!(matches!(e, Error::Serialization(_)));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad}").unwrap_err();
        let e: Error = json_err.into();
        assert!(matches!(e, Error::Serialization(_)));
    }
}
