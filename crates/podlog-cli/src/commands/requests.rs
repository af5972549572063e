use chrono::{DateTime, Utc};
use podlog_core::RequestObservation;
use podlog_engine::format::{format_request_summary, truncate};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::{CliError, Settings};

#[derive(Tabled)]
struct FailedRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "Status")]
    status: u16,
    #[tabled(rename = "Time (s)")]
    response_time: String,
}

impl From<&RequestObservation> for FailedRow {
    fn from(r: &RequestObservation) -> Self {
        Self {
            time: r.timestamp.format("%H:%M:%S").to_string(),
            service: r.service.clone(),
            method: r.method.clone(),
            endpoint: truncate(&r.endpoint, 60),
            status: r.status_code,
            response_time: format!("{:.3}", r.response_time_secs),
        }
    }
}

pub async fn run(
    settings: &Settings,
    since: Option<DateTime<Utc>>,
    errors: bool,
    json: bool,
) -> Result<(), CliError> {
    let analyzer = super::cluster_analyzer(settings.load()?);
    let cancel = super::cancel_on_ctrl_c();

    let analysis = analyzer.analyze_requests(since, &cancel).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    if since.is_none() {
        println!("[podlog] Request analysis needs a lower time bound, pass --since");
        return Ok(());
    }

    print!("{}", format_request_summary(&analysis));

    if errors {
        let failed: Vec<FailedRow> = analysis
            .requests
            .iter()
            .filter(|r| r.is_error)
            .map(FailedRow::from)
            .collect();
        if failed.is_empty() {
            println!("[podlog] No failed requests");
        } else {
            let mut table = Table::new(failed);
            table.with(Style::rounded());
            println!("{table}");
        }
    }
    Ok(())
}
