use thiserror::Error;

use crate::feature::ClusterId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    #[error("no cluster with id {0}")]
    UnknownCluster(ClusterId),
}
