//! Cluster client errors

use thiserror::Error;

/// Errors that can occur when talking to the Kubernetes API server.
///
/// The messages carry the API server's own wording (e.g.
/// `configmaps "edge" not found`) since they end up verbatim in Events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    /// The requested object does not exist
    #[error("{0}")]
    NotFound(String),

    /// The object was modified concurrently (optimistic concurrency check failed)
    #[error("{0}")]
    Conflict(String),

    /// API server unreachable, rejected the request, or any other transport fault
    #[error("{0}")]
    Transport(String),
}

impl ClusterError {
    /// Returns true for `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound(_))
    }

    /// Returns true for `Conflict`.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClusterError::Conflict(_))
    }
}

impl From<kube::Error> for ClusterError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => ClusterError::NotFound(ae.message.clone()),
            kube::Error::Api(ae) if ae.code == 409 => ClusterError::Conflict(ae.message.clone()),
            other => ClusterError::Transport(other.to_string()),
        }
    }
}
