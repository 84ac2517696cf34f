#![forbid(unsafe_code)]

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{capability} capability unavailable: {detail}")]
    CapabilityUnavailable {
        capability: &'static str,
        detail: String,
    },
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO",
            Self::Sql(_) => "SQL",
            Self::Serde(_) => "SERDE",
            Self::CapabilityUnavailable { .. } => "CAPABILITY_UNAVAILABLE",
            Self::InvalidInput(_) => "INVALID_INPUT",
        }
    }

    /// Environment errors that retrying cannot fix.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CapabilityUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_missing_capabilities_are_fatal() {
        let capability = StoreError::CapabilityUnavailable {
            capability: "full-text",
            detail: "no such module: fts5".to_string(),
        };
        assert_eq!(capability.code(), "CAPABILITY_UNAVAILABLE");
        assert!(capability.is_fatal());

        let invalid = StoreError::InvalidInput("db_file_name must not be empty");
        assert_eq!(invalid.code(), "INVALID_INPUT");
        assert!(!invalid.is_fatal());

        let io = StoreError::from(std::io::Error::other("disk gone"));
        assert_eq!(io.code(), "IO");
        assert!(!io.is_fatal());
    }
}
