use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreseedError {
    #[error("User aborted configuration: {reason}")]
    UserAborted { reason: String },

    #[error("No {role} storage backends available")]
    NoStorageBackend { role: String },

    #[error("The {name} storage pool already exists")]
    PoolAlreadyExists { name: String },

    #[error("The LVM thin provisioning tools couldn't be found on the system")]
    ThinProvisioningUnavailable,

    #[error("Failed to setup trust relationship with cluster node {address}: {details}")]
    TrustSetup { address: String, details: String },

    #[error("Failed to retrieve {resource} from the cluster: {details}")]
    RemoteListing { resource: String, details: String },

    #[error("Connection error to {address}: {details}")]
    Connection { address: String, details: String },

    #[error("Certificate error: {message}")]
    Certificate { message: String },

    #[error("Host probe '{operation}' failed: {details}")]
    HostProbe { operation: String, details: String },

    #[error("Prompt error: {message}")]
    Prompt { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

pub type PreseedResult<T> = std::result::Result<T, PreseedError>;

impl PreseedError {
    /// Shorthand for an explicit operator abort
    pub fn aborted(reason: impl Into<String>) -> Self {
        PreseedError::UserAborted {
            reason: reason.into(),
        }
    }

    /// Whether the run ended because the operator declined a mandatory step
    pub fn is_operator_abort(&self) -> bool {
        matches!(
            self,
            PreseedError::UserAborted { .. } | PreseedError::ThinProvisioningUnavailable
        )
    }

    /// Errors that end the planning run. Validation and connection errors
    /// are answered by asking the operator again.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            PreseedError::Validation { .. } | PreseedError::Connection { .. }
        )
    }
}

impl From<toml::ser::Error> for PreseedError {
    fn from(err: toml::ser::Error) -> Self {
        PreseedError::InvalidConfiguration {
            message: format!("Failed to render configuration: {}", err),
        }
    }
}

impl From<hyper::Error> for PreseedError {
    fn from(err: hyper::Error) -> Self {
        PreseedError::Connection {
            address: "local daemon".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<http::Error> for PreseedError {
    fn from(err: http::Error) -> Self {
        PreseedError::Connection {
            address: "local daemon".to_string(),
            details: format!("Invalid request: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(PreseedError::aborted("no").is_operator_abort());
        assert!(PreseedError::ThinProvisioningUnavailable.is_operator_abort());
        assert!(PreseedError::ThinProvisioningUnavailable.is_fatal());

        let fetch = PreseedError::Connection {
            address: "10.0.0.1:8443".to_string(),
            details: "connection refused".to_string(),
        };
        assert!(!fetch.is_fatal());
        assert!(!fetch.is_operator_abort());

        let trust = PreseedError::TrustSetup {
            address: "10.0.0.1:8443".to_string(),
            details: "not authorized".to_string(),
        };
        assert!(trust.is_fatal());
        assert_eq!(
            trust.to_string(),
            "Failed to setup trust relationship with cluster node 10.0.0.1:8443: not authorized"
        );
    }
}
