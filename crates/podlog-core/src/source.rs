use std::future::Future;

use chrono::{DateTime, Utc};

use crate::pod::PodListing;
use crate::PodlogError;

/// Cluster introspection: lists the pods of a namespace.
pub trait PodSource: Send + Sync {
    fn list_pods(
        &self,
        namespace: &str,
    ) -> impl Future<Output = Result<Vec<PodListing>, PodlogError>> + Send;
}

/// Log retrieval for a single pod.
///
/// Implementations must return only the text emitted since `since`, and fail
/// with an error when that bound cannot be honoured rather than falling back
/// to unbounded history.
pub trait LogSource: Send + Sync {
    fn fetch_logs(
        &self,
        pod_name: &str,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<String, PodlogError>> + Send;
}
