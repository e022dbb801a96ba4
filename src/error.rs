//! Unified error handling for the outdoor-atlas library.
//!
//! Only data loading, configuration and source fetching can fail.
//! Classification, clustering and recommendation are total functions that
//! fall back to sentinel values instead of returning errors.

use std::fmt;

/// Unified error type for outdoor-atlas operations.
#[derive(Debug, Clone)]
pub enum AtlasError {
    /// A feature carries geometry that cannot be used (unclosed ring, too few positions, ...)
    InvalidGeometry { feature_id: String, message: String },
    /// A coordinate is non-finite or out of range
    InvalidCoordinates { feature_id: String, message: String },
    /// Input text could not be parsed as GeoJSON / JSON
    Parse { message: String },
    /// Configuration error
    Config { message: String },
    /// A feature or collection that was asked for does not exist
    NotFound { what: String },
    /// A data source failed to deliver its payload
    Source {
        source_name: String,
        message: String,
        status_code: Option<u16>,
    },
}

impl fmt::Display for AtlasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtlasError::InvalidGeometry {
                feature_id,
                message,
            } => {
                write!(f, "Feature '{}' has invalid geometry: {}", feature_id, message)
            }
            AtlasError::InvalidCoordinates {
                feature_id,
                message,
            } => {
                write!(
                    f,
                    "Feature '{}' has invalid coordinates: {}",
                    feature_id, message
                )
            }
            AtlasError::Parse { message } => write!(f, "Parse error: {}", message),
            AtlasError::Config { message } => write!(f, "Configuration error: {}", message),
            AtlasError::NotFound { what } => write!(f, "Not found: {}", what),
            AtlasError::Source {
                source_name,
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "Source '{}' failed ({}): {}", source_name, code, message)
                } else {
                    write!(f, "Source '{}' failed: {}", source_name, message)
                }
            }
        }
    }
}

impl std::error::Error for AtlasError {}

impl From<serde_json::Error> for AtlasError {
    fn from(err: serde_json::Error) -> Self {
        AtlasError::Parse {
            message: err.to_string(),
        }
    }
}

impl From<geojson::Error> for AtlasError {
    fn from(err: geojson::Error) -> Self {
        AtlasError::Parse {
            message: err.to_string(),
        }
    }
}

/// Result type alias for outdoor-atlas operations.
pub type Result<T> = std::result::Result<T, AtlasError>;

/// Extension trait for converting Option to AtlasError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a not-found error.
    fn ok_or_not_found(self, what: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, what: &str) -> Result<T> {
        self.ok_or_else(|| AtlasError::NotFound {
            what: what.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AtlasError::InvalidGeometry {
            feature_id: "zone-7".to_string(),
            message: "ring is not closed".to_string(),
        };
        assert!(err.to_string().contains("zone-7"));
        assert!(err.to_string().contains("not closed"));

        let err = AtlasError::Source {
            source_name: "alerts".to_string(),
            message: "too many requests".to_string(),
            status_code: Some(429),
        };
        assert!(err.to_string().contains("(429)"));
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        let result = none.ok_or_not_found("trailhead 12");
        assert!(matches!(result, Err(AtlasError::NotFound { .. })));

        assert_eq!(Some(3).ok_or_not_found("trailhead 3").unwrap(), 3);
    }

    #[test]
    fn test_from_serde_error() {
        let err: AtlasError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, AtlasError::Parse { .. }));
    }
}
