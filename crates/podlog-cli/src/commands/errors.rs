use chrono::{DateTime, Utc};
use podlog_engine::format::format_error_summary;

use super::{CliError, Settings};

pub async fn run(
    settings: &Settings,
    since: DateTime<Utc>,
    service: Option<String>,
    top: usize,
    json: bool,
) -> Result<(), CliError> {
    let analyzer = super::cluster_analyzer(settings.load()?);
    let cancel = super::cancel_on_ctrl_c();

    let analysis = analyzer
        .analyze_errors(since, service.as_deref(), &cancel)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    if analysis.total_errors == 0 {
        println!(
            "[podlog] No errors since {} ({} pods analyzed)",
            since.format("%Y-%m-%d %H:%M:%S UTC"),
            analysis.pods_analyzed.len()
        );
        return Ok(());
    }

    print!("{}", format_error_summary(&analysis, top));
    Ok(())
}
