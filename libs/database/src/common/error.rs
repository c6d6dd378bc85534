use std::time::Duration;

use mongodb::bson::Bson;
use mongodb::error::ErrorKind;

use crate::mongodb::ConnectionState;

/// Failure reported by a cluster backend (the driver layer)
///
/// The manager-level errors below wrap this so callers can still reach the
/// driver's own error through `source()`.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Error raised by the MongoDB driver
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// The backend did not answer within the allotted time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The backend cannot serve requests (e.g. already shut down)
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The server answered with a reply we could not interpret
    #[error("malformed reply: {0}")]
    Malformed(String),

    /// The cluster rejected the supplied credentials
    #[error("credentials rejected: {0}")]
    Unauthenticated(String),
}

/// Server codes `Unauthorized` and `AuthenticationFailed`
const AUTH_ERROR_CODES: [i32; 2] = [13, 18];

impl BackendError {
    /// The cluster refused the credentials or the user lacks privileges
    pub fn is_auth_failure(&self) -> bool {
        match self {
            BackendError::Unauthenticated(_) => true,
            BackendError::Mongo(e) => match e.kind.as_ref() {
                ErrorKind::Authentication { .. } => true,
                ErrorKind::Command(command) => AUTH_ERROR_CODES.contains(&command.code),
                _ => false,
            },
            _ => false,
        }
    }
}

/// Cannot establish or verify a session with the cluster
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("invalid connection configuration: {0}")]
    InvalidConfig(String),

    #[error("cluster unreachable: {0}")]
    Unreachable(#[source] BackendError),

    #[error("authentication failed: {0}")]
    Unauthenticated(#[source] BackendError),

    #[error("liveness check did not complete within {0:?}")]
    Timeout(Duration),

    #[error("cannot connect while {0}")]
    InvalidState(ConnectionState),

    #[error("connection manager is closed; create a new manager to reconnect")]
    Closed,
}

impl ConnectionError {
    /// Classify a failed liveness check
    pub fn from_ping(error: BackendError) -> Self {
        if error.is_auth_failure() {
            ConnectionError::Unauthenticated(error)
        } else {
            ConnectionError::Unreachable(error)
        }
    }

    /// Whether another attempt could succeed without changing anything
    pub fn is_transient(&self) -> bool {
        matches!(self, ConnectionError::Unreachable(_) | ConnectionError::Timeout(_))
    }
}

/// Metadata fetch failed on a live session
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("not connected (state: {0})")]
    NotConnected(ConnectionState),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("query failed: {0}")]
    Backend(#[from] BackendError),

    #[error("cluster reports no healthy members: {0}")]
    Unhealthy(String),
}

/// Insert/read probe failed
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("not connected (state: {0})")]
    NotConnected(ConnectionState),

    #[error("probe document must not be empty")]
    EmptyDocument,

    #[error("insert into {namespace} failed: {source}")]
    Insert {
        namespace: String,
        #[source]
        source: BackendError,
    },

    #[error("read from {namespace} failed: {source}")]
    Read {
        namespace: String,
        #[source]
        source: BackendError,
    },

    #[error("probe step timed out after {0:?}")]
    Timeout(Duration),

    #[error("inserted document {0} could not be read back")]
    NotFound(Bson),

    #[error("document {0} read back differs from what was inserted")]
    Mismatch(Bson),
}

/// Unified error type for callers that do not care which step failed
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Operation error: {0}")]
    Operation(#[from] OperationError),
}

/// Result type alias for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_connection_error_keeps_backend_source() {
        let err = ConnectionError::Unreachable(BackendError::Unavailable("no primary".into()));
        assert!(err.to_string().contains("no primary"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_only_network_failures_are_transient() {
        assert!(ConnectionError::Timeout(Duration::from_secs(5)).is_transient());
        assert!(
            ConnectionError::Unreachable(BackendError::Unavailable("down".into())).is_transient()
        );
        assert!(!ConnectionError::InvalidConfig("empty uri".into()).is_transient());
        assert!(!ConnectionError::Closed.is_transient());
        assert!(!ConnectionError::InvalidState(ConnectionState::Connected).is_transient());
    }

    fn command_error(code: i32, code_name: &str) -> BackendError {
        let command: mongodb::error::CommandError = mongodb::bson::from_document(
            mongodb::bson::doc! { "code": code, "codeName": code_name, "errmsg": "rejected" },
        )
        .unwrap();
        BackendError::Mongo(mongodb::error::Error::from(ErrorKind::Command(command)))
    }

    #[test]
    fn test_auth_failures_are_not_transient() {
        for backend in [
            command_error(18, "AuthenticationFailed"),
            command_error(13, "Unauthorized"),
            BackendError::Unauthenticated("bad password".into()),
        ] {
            let err = ConnectionError::from_ping(backend);
            assert!(matches!(err, ConnectionError::Unauthenticated(_)));
            assert!(!err.is_transient());
            assert!(err.source().is_some());
        }
    }

    #[test]
    fn test_network_failures_stay_transient() {
        let refused = BackendError::Mongo(mongodb::error::Error::from(
            std::io::ErrorKind::ConnectionRefused,
        ));
        let err = ConnectionError::from_ping(refused);
        assert!(matches!(err, ConnectionError::Unreachable(_)));
        assert!(err.is_transient());

        let err = ConnectionError::from_ping(command_error(91, "ShutdownInProgress"));
        assert!(err.is_transient());
    }

    #[test]
    fn test_database_error_from_kinds() {
        let err: DatabaseError = QueryError::NotConnected(ConnectionState::Closed).into();
        assert!(matches!(err, DatabaseError::Query(_)));
        assert!(err.to_string().contains("closed"));

        let err: DatabaseError = OperationError::EmptyDocument.into();
        assert!(matches!(err, DatabaseError::Operation(_)));
    }

    #[test]
    fn test_operation_error_names_namespace() {
        let err = OperationError::Insert {
            namespace: "commonDB.test".into(),
            source: BackendError::Timeout(Duration::from_secs(5)),
        };
        let message = err.to_string();
        assert!(message.contains("commonDB.test"));
        assert!(message.contains("5s"));
    }
}
