use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use podlog_config::PodlogConfig;
use podlog_core::{
    ErrorBlock, LogSource, PodCategory, PodDescriptor, PodListing, PodSource, PodlogError,
    RequestObservation,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classifier::PodClassifier;
use crate::dedup::Deduplicator;
use crate::extract::ErrorExtractor;
use crate::request::RequestParser;
use crate::summary::{
    summarize_errors, summarize_requests, ErrorAnalysis, PodFailure, RequestAnalysis,
};

/// Outcome of one pod task, tagged with its discovery index.
type PodOutcome<T> = (usize, PodDescriptor, Result<Vec<T>, PodlogError>);

/// Drives discovery, per-pod retrieval and parsing, and the final merge.
///
/// Per-pod work runs concurrently; everything after the join (merge, dedup,
/// aggregation) is single-threaded and in discovery order.
pub struct Analyzer<S> {
    config: Arc<PodlogConfig>,
    source: Arc<S>,
    classifier: PodClassifier,
    extractor: Arc<ErrorExtractor>,
    parser: Arc<RequestParser>,
    deduplicator: Deduplicator,
}

impl<S> Analyzer<S>
where
    S: PodSource + LogSource + 'static,
{
    pub fn new(config: PodlogConfig, source: S) -> Self {
        Self::from_shared(Arc::new(config), Arc::new(source))
    }

    pub fn from_shared(config: Arc<PodlogConfig>, source: Arc<S>) -> Self {
        Self {
            classifier: PodClassifier::new(&config.pods),
            extractor: Arc::new(ErrorExtractor::new(&config.errors)),
            parser: Arc::new(RequestParser::new(&config.requests)),
            deduplicator: Deduplicator::new(config.errors.similarity_threshold),
            config,
            source,
        }
    }

    pub fn config(&self) -> &PodlogConfig {
        &self.config
    }

    /// All pods with logs that match a service fragment or a test prefix.
    pub async fn discover_pods(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<PodDescriptor>, PodlogError> {
        let listing = self.list_pods(cancel).await?;
        let pods = self.classifier.classify(&listing);
        log_discovery(&self.config.namespace, &pods);
        Ok(pods)
    }

    /// Running API pods, used for request analysis.
    pub async fn discover_api_pods(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<PodDescriptor>, PodlogError> {
        let listing = self.list_pods(cancel).await?;
        let pods = self.classifier.classify_api(&listing);
        info!(namespace = %self.config.namespace, api_pods = pods.len(), "discovered API pods");
        Ok(pods)
    }

    async fn list_pods(&self, cancel: &CancellationToken) -> Result<Vec<PodListing>, PodlogError> {
        let limit = self.config.retrieval.list_timeout();
        let listed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PodlogError::Cancelled),
            r = tokio::time::timeout(limit, self.source.list_pods(&self.config.namespace)) => r,
        };
        match listed {
            Ok(Ok(listing)) => Ok(listing),
            Ok(Err(PodlogError::Cancelled)) => Err(PodlogError::Cancelled),
            Ok(Err(PodlogError::DiscoveryFailed(reason))) => Err(PodlogError::DiscoveryFailed(reason)),
            Ok(Err(e)) => Err(PodlogError::DiscoveryFailed(e.to_string())),
            Err(_) => Err(PodlogError::DiscoveryFailed(format!(
                "pod listing timed out after {}s",
                limit.as_secs()
            ))),
        }
    }

    /// Collect, deduplicate and aggregate errors emitted since `since`.
    ///
    /// With `service_filter` set, only pods of that service are analyzed; when
    /// no pod matches, all pods are analyzed. Discovery failures and per-pod
    /// failures produce a (possibly empty) result; only cancellation is
    /// returned as an error.
    pub async fn analyze_errors(
        &self,
        since: DateTime<Utc>,
        service_filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ErrorAnalysis, PodlogError> {
        let mut pods = match self.discover_pods(cancel).await {
            Ok(pods) => pods,
            Err(PodlogError::Cancelled) => return Err(PodlogError::Cancelled),
            Err(e) => {
                warn!(error = %e, "pod discovery failed, reporting empty error analysis");
                return Ok(ErrorAnalysis::empty(since));
            }
        };

        if let Some(service) = service_filter {
            let filtered: Vec<PodDescriptor> =
                pods.iter().filter(|p| p.service == service).cloned().collect();
            if filtered.is_empty() {
                warn!(service, "no pods found for service, analyzing all pods");
            } else {
                info!(service, pods = filtered.len(), "filtering error collection to service");
                pods = filtered;
            }
        }

        if pods.is_empty() {
            warn!("no pods to analyze for errors");
            return Ok(ErrorAnalysis::empty(since));
        }

        let extractor = Arc::clone(&self.extractor);
        let merged = self
            .fan_out(pods, since, cancel, move |text, pod| {
                let blocks = extractor.extract(text, pod);
                info!(pod = %pod.name, errors = blocks.len(), "collected errors");
                blocks
            })
            .await?;

        let blocks: Vec<ErrorBlock> = merged.items;
        let groups = self.deduplicator.deduplicate(&blocks);
        let analysis = summarize_errors(&blocks, groups, since, merged.analyzed, merged.failed);
        info!(
            total = analysis.total_errors,
            unique = analysis.unique_count,
            critical = analysis.critical_count,
            pods = analysis.pods_analyzed.len(),
            failed = analysis.pods_failed.len(),
            "error analysis complete"
        );
        Ok(analysis)
    }

    /// Parse API requests from Running API pods.
    ///
    /// Without a lower time bound nothing is fetched and an empty result is
    /// returned.
    pub async fn analyze_requests(
        &self,
        since: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> Result<RequestAnalysis, PodlogError> {
        let Some(since) = since else {
            warn!(error = %PodlogError::MissingTimeBound, "skipping request analysis");
            return Ok(RequestAnalysis::empty());
        };

        let pods = match self.discover_api_pods(cancel).await {
            Ok(pods) => pods,
            Err(PodlogError::Cancelled) => return Err(PodlogError::Cancelled),
            Err(e) => {
                warn!(error = %e, "API pod discovery failed, reporting empty request analysis");
                return Ok(RequestAnalysis::empty());
            }
        };
        if pods.is_empty() {
            warn!("no API pods to analyze");
            return Ok(RequestAnalysis::empty());
        }

        let parser = Arc::clone(&self.parser);
        let merged = self
            .fan_out(pods, since, cancel, move |text, pod| {
                let requests = parser.parse(text, pod, Some(since));
                info!(pod = %pod.name, requests = requests.len(), "parsed API requests");
                requests
            })
            .await?;

        let analysis: RequestAnalysis = summarize_requests(merged.items, merged.analyzed, merged.failed);
        info!(
            total = analysis.total_requests,
            errors = analysis.error_requests,
            success_rate = analysis.success_rate_percent,
            avg_response_secs = analysis.avg_response_time,
            "request analysis complete"
        );
        Ok(analysis)
    }

    /// Fetch and parse every pod concurrently, then merge in discovery order.
    async fn fan_out<T, F>(
        &self,
        pods: Vec<PodDescriptor>,
        since: DateTime<Utc>,
        cancel: &CancellationToken,
        parse: F,
    ) -> Result<Merged<T>, PodlogError>
    where
        T: Send + 'static,
        F: Fn(&str, &PodDescriptor) -> Vec<T> + Send + Sync + 'static,
    {
        if cancel.is_cancelled() {
            return Err(PodlogError::Cancelled);
        }

        let permits = pods.len().min(self.config.retrieval.max_concurrent_fetches).max(1);
        let semaphore = Arc::new(Semaphore::new(permits));
        let fetch_timeout = self.config.retrieval.fetch_timeout();
        let parse = Arc::new(parse);
        let total = pods.len();
        debug!(pods = total, permits, "starting per-pod tasks");

        let mut tasks: JoinSet<PodOutcome<T>> = JoinSet::new();
        for (idx, pod) in pods.into_iter().enumerate() {
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let parse = Arc::clone(&parse);
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (idx, pod, Err(PodlogError::Cancelled));
                };
                let fetched =
                    tokio::time::timeout(fetch_timeout, source.fetch_logs(&pod.name, since)).await;
                let result = match fetched {
                    Ok(Ok(text)) => Ok((*parse)(&text, &pod)),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(PodlogError::RetrievalTimeout {
                        pod: pod.name.clone(),
                        timeout: fetch_timeout,
                    }),
                };
                (idx, pod, result)
            });
        }

        let mut outcomes: Vec<PodOutcome<T>> = Vec::with_capacity(total);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    warn!(pending = tasks.len(), "analysis cancelled, aborting pod tasks");
                    return Err(PodlogError::Cancelled);
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok(outcome)) => outcomes.push(outcome),
                    Some(Err(e)) => warn!(error = %e, "pod task did not complete"),
                    None => break,
                },
            }
        }

        outcomes.sort_by_key(|(idx, _, _)| *idx);
        let mut merged = Merged::default();
        for (_, pod, result) in outcomes {
            match result {
                Ok(items) => {
                    merged.items.extend(items);
                    merged.analyzed.push(pod.name);
                }
                Err(e) => {
                    warn!(pod = %pod.name, error = %e, "skipping pod");
                    merged.failed.push(PodFailure::new(pod.name, e));
                }
            }
        }
        Ok(merged)
    }
}

/// Flattened per-pod results.
struct Merged<T> {
    items: Vec<T>,
    analyzed: Vec<String>,
    failed: Vec<PodFailure>,
}

impl<T> Default for Merged<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            analyzed: Vec::new(),
            failed: Vec::new(),
        }
    }
}

fn log_discovery(namespace: &str, pods: &[PodDescriptor]) {
    let tests = pods.iter().filter(|p| p.category == PodCategory::Test).count();
    let services: BTreeSet<&str> = pods.iter().map(|p| p.service.as_str()).collect();
    info!(
        namespace,
        service_pods = pods.len() - tests,
        test_pods = tests,
        services = ?services,
        "discovered pods"
    );
}

/// Parse a single pod's saved log text without any cluster access.
pub fn scan_text(
    config: &PodlogConfig,
    text: &str,
    pod: &PodDescriptor,
    since: Option<DateTime<Utc>>,
) -> (Vec<ErrorBlock>, Vec<RequestObservation>) {
    let blocks = ErrorExtractor::new(&config.errors).extract(text, pod);
    let requests = RequestParser::new(&config.requests).parse(text, pod, since);
    (blocks, requests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use podlog_core::{PodListing, PodPhase};
    use std::collections::HashMap;

    struct MemorySource {
        pods: Vec<PodListing>,
        logs: HashMap<String, String>,
    }

    impl PodSource for MemorySource {
        async fn list_pods(&self, _namespace: &str) -> Result<Vec<PodListing>, PodlogError> {
            Ok(self.pods.clone())
        }
    }

    impl LogSource for MemorySource {
        async fn fetch_logs(
            &self,
            pod_name: &str,
            _since: DateTime<Utc>,
        ) -> Result<String, PodlogError> {
            self.logs
                .get(pod_name)
                .cloned()
                .ok_or_else(|| PodlogError::RetrievalFailed {
                    pod: pod_name.into(),
                    reason: "no such pod".into(),
                })
        }
    }

    fn since() -> DateTime<Utc> {
        "2024-01-01T00:00:00Z".parse().unwrap()
    }

    fn source() -> MemorySource {
        MemorySource {
            pods: vec![
                PodListing::new("nova-api-1", PodPhase::Running),
                PodListing::new("octavia-api-2", PodPhase::Running),
                PodListing::new("unrelated-0", PodPhase::Running),
            ],
            logs: HashMap::from([
                (
                    "nova-api-1".to_string(),
                    "2025-01-01 10:00:00.123 4 ERROR nova.api Instance build failed badly".to_string(),
                ),
                (
                    "octavia-api-2".to_string(),
                    "2025-01-01 10:00:00.123 4 CRITICAL octavia.api Amphora lost heartbeat".to_string(),
                ),
            ]),
        }
    }

    #[tokio::test]
    async fn test_discovery_skips_unknown_pods() {
        let analyzer = Analyzer::new(PodlogConfig::default(), source());
        let pods = analyzer.discover_pods(&CancellationToken::new()).await.unwrap();
        let names: Vec<&str> = pods.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["nova-api-1", "octavia-api-2"]);
    }

    #[tokio::test]
    async fn test_errors_merged_in_discovery_order() {
        let analyzer = Analyzer::new(PodlogConfig::default(), source());
        let a = analyzer
            .analyze_errors(since(), None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(a.total_errors, 2);
        assert_eq!(a.unique_count, 2);
        assert_eq!(a.critical_count, 1);
        assert_eq!(a.pods_analyzed, vec!["nova-api-1", "octavia-api-2"]);
        assert_eq!(a.unique_errors[0].service, "octavia");
    }

    #[tokio::test]
    async fn test_service_filter_falls_back_to_all() {
        let analyzer = Analyzer::new(PodlogConfig::default(), source());
        let cancel = CancellationToken::new();
        let only = analyzer.analyze_errors(since(), Some("nova"), &cancel).await.unwrap();
        assert_eq!(only.pods_analyzed, vec!["nova-api-1"]);
        let all = analyzer.analyze_errors(since(), Some("swift"), &cancel).await.unwrap();
        assert_eq!(all.pods_analyzed.len(), 2);
    }

    #[tokio::test]
    async fn test_requests_without_bound_are_empty() {
        let analyzer = Analyzer::new(PodlogConfig::default(), source());
        let a = analyzer
            .analyze_requests(None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(a.total_requests, 0);
        assert!(a.pods_analyzed.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let analyzer = Analyzer::new(PodlogConfig::default(), source());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = analyzer.analyze_errors(since(), None, &cancel).await.unwrap_err();
        assert!(matches!(err, PodlogError::Cancelled));
    }

    #[test]
    fn test_scan_text() {
        let pod = PodDescriptor {
            name: "nova-api-1".into(),
            service: "nova".into(),
            category: PodCategory::Service,
        };
        let text = "\
2025-01-01 10:00:00.123 4 ERROR nova.api Instance build failed badly
2025-01-01 10:00:01.000 4 INFO nova.api 10.0.0.1 \"GET /v2.1/servers HTTP/1.1\" status: 200 len: 10 time: 0.1";
        let (blocks, requests) = scan_text(&PodlogConfig::default(), text, &pod, Some(since()));
        assert_eq!(blocks.len(), 1);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].response_time_secs, 0.1);
    }
}
