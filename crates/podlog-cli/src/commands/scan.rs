use std::path::PathBuf;

use chrono::{DateTime, Utc};
use podlog_core::{PodCategory, PodDescriptor};
use podlog_engine::format::{format_group_line, format_request_summary};
use podlog_engine::summary::summarize_requests;
use podlog_engine::{scan_text, Deduplicator, PodClassifier};

use super::{CliError, Settings};

/// Descriptor for a pod given on the command line. An explicit service wins;
/// otherwise the name is classified, falling back to the pod name itself.
fn describe_pod(classifier: &PodClassifier, pod: String, service: Option<String>) -> PodDescriptor {
    let classified = classifier.classify_name(&pod);
    match (service, classified) {
        (Some(service), classified) => PodDescriptor {
            category: classified.map_or(PodCategory::Service, |d| d.category),
            name: pod,
            service,
        },
        (None, Some(descriptor)) => descriptor,
        (None, None) => PodDescriptor {
            service: pod.clone(),
            name: pod,
            category: PodCategory::Service,
        },
    }
}

pub fn run(
    settings: &Settings,
    file: PathBuf,
    pod: String,
    service: Option<String>,
    since: Option<DateTime<Utc>>,
    json: bool,
) -> Result<(), CliError> {
    let config = settings.load()?;
    let text = std::fs::read_to_string(&file).map_err(|source| CliError::ReadLog {
        path: file.clone(),
        source,
    })?;
    let pod = describe_pod(&PodClassifier::new(&config.pods), pod, service);

    let (blocks, requests) = scan_text(&config, &text, &pod, since);
    let groups = Deduplicator::new(config.errors.similarity_threshold).deduplicate(&blocks);
    let requests = summarize_requests(requests, vec![pod.name.clone()], Vec::new());

    if json {
        let out = serde_json::json!({
            "pod": pod,
            "total_errors": blocks.len(),
            "unique_errors": groups,
            "requests": requests,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "[podlog] {} ({}, {}): {} errors, {} unique",
        pod.name,
        pod.service,
        pod.category,
        blocks.len(),
        groups.len()
    );
    for (i, group) in groups.iter().enumerate() {
        println!("  {}. {}", i + 1, format_group_line(group, 100));
    }
    if since.is_some() {
        print!("{}", format_request_summary(&requests));
    } else {
        println!("[podlog] Pass --since to parse API requests");
    }
    Ok(())
}
