//! Error type for network construction, validation and case loading.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Case file could not be deserialized
    #[error("Parse error: {0}")]
    Parse(String),

    /// One or more validation errors; the message joins every issue
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("{entity} references unknown bus {bus}")]
    UnknownBus { entity: String, bus: usize },

    #[error("Line {0} has zero series impedance")]
    ZeroImpedance(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::UnknownBus {
            entity: "Gen 3".to_string(),
            bus: 9,
        };
        assert_eq!(err.to_string(), "Gen 3 references unknown bus 9");

        let err = CoreError::ZeroImpedance("L1".to_string());
        assert!(err.to_string().contains("zero series impedance"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "case.json");
        let err: CoreError = io_err.into();
        assert!(matches!(err, CoreError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{ nope");
        let err: CoreError = parse.unwrap_err().into();
        assert!(matches!(err, CoreError::Parse(_)));
    }
}
