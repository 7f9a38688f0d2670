// src/error.rs
use std::fmt;

/// Custom error types for the gbm-moments library
#[derive(Debug, Clone, PartialEq)]
pub enum SdeError {
    /// Invalid parameter values
    InvalidParameters {
        parameter: String,
        value: f64,
        constraint: String,
    },

    /// Invalid configuration (counts and sizes)
    InvalidConfiguration { field: String, reason: String },

    /// Not enough observations to estimate a statistic
    InsufficientData { required: usize, actual: usize },

    /// An output buffer could not be sized or allocated
    ResourceExhausted {
        resource: String,
        requested: String,
        reason: String,
    },

    /// Numerical instability (overflow, non-finite results)
    NumericalInstability { method: String, reason: String },
}

impl fmt::Display for SdeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdeError::InvalidParameters {
                parameter,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid parameter '{}' = {}: {}",
                    parameter, value, constraint
                )
            }
            SdeError::InvalidConfiguration { field, reason } => {
                write!(f, "Invalid configuration for '{}': {}", field, reason)
            }
            SdeError::InsufficientData { required, actual } => {
                write!(
                    f,
                    "Insufficient data: need at least {} samples, got {}",
                    required, actual
                )
            }
            SdeError::ResourceExhausted {
                resource,
                requested,
                reason,
            } => {
                write!(
                    f,
                    "Cannot allocate {} ({}): {}",
                    resource, requested, reason
                )
            }
            SdeError::NumericalInstability { method, reason } => {
                write!(f, "Numerical instability in {}: {}", method, reason)
            }
        }
    }
}

impl std::error::Error for SdeError {}

/// Result type alias for gbm-moments operations
pub type SdeResult<T> = Result<T, SdeError>;

/// Validation utilities
pub mod validation {
    use super::{SdeError, SdeResult};

    /// Validate that a parameter is positive
    pub fn validate_positive(name: &str, value: f64) -> SdeResult<()> {
        if value.is_nan() || value <= 0.0 {
            Err(SdeError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be positive (> 0)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a parameter is non-negative
    pub fn validate_non_negative(name: &str, value: f64) -> SdeResult<()> {
        if value.is_nan() || value < 0.0 {
            Err(SdeError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be non-negative (≥ 0)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a value is finite and not NaN
    pub fn validate_finite(name: &str, value: f64) -> SdeResult<()> {
        if !value.is_finite() {
            Err(SdeError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be finite (not NaN or infinite)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate a count (paths, steps, batch sizes)
    pub fn validate_count(field: &str, count: usize) -> SdeResult<()> {
        if count == 0 {
            Err(SdeError::InvalidConfiguration {
                field: field.to_string(),
                reason: "must be greater than 0".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a sample is long enough
    pub fn validate_sample_len(len: usize, required: usize) -> SdeResult<()> {
        if len < required {
            Err(SdeError::InsufficientData {
                required,
                actual: len,
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::validation::*;
    use super::*;

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive("t", 1.0).is_ok());
        assert!(validate_positive("t", 0.0).is_err());
        assert!(validate_positive("t", -0.1).is_err());
        assert!(validate_positive("t", f64::NAN).is_err());
    }

    #[test]
    fn test_validate_non_negative() {
        assert!(validate_non_negative("sigma", 0.0).is_ok());
        assert!(validate_non_negative("sigma", 0.2).is_ok());
        assert!(validate_non_negative("sigma", -1e-12).is_err());
    }

    #[test]
    fn test_validate_finite() {
        assert!(validate_finite("value", 1.0).is_ok());
        assert!(validate_finite("value", f64::NAN).is_err());
        assert!(validate_finite("value", f64::INFINITY).is_err());
        assert!(validate_finite("value", f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn test_validate_count_and_sample_len() {
        assert!(validate_count("paths", 1).is_ok());
        assert!(matches!(
            validate_count("paths", 0),
            Err(SdeError::InvalidConfiguration { .. })
        ));
        assert!(validate_sample_len(2, 2).is_ok());
        assert_eq!(
            validate_sample_len(1, 2),
            Err(SdeError::InsufficientData {
                required: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_error_display() {
        let error = SdeError::InvalidParameters {
            parameter: "sigma".to_string(),
            value: -0.1,
            constraint: "must be non-negative".to_string(),
        };

        let display = format!("{}", error);
        assert!(display.contains("sigma"));
        assert!(display.contains("-0.1"));
        assert!(display.contains("non-negative"));

        let error = SdeError::InsufficientData {
            required: 2,
            actual: 0,
        };
        assert_eq!(
            error.to_string(),
            "Insufficient data: need at least 2 samples, got 0"
        );
    }
}
