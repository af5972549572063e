use podlog_core::PodDescriptor;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::{CliError, Settings};

#[derive(Tabled)]
struct PodRow<'a> {
    #[tabled(rename = "Name")]
    name: &'a str,
    #[tabled(rename = "Service")]
    service: &'a str,
    #[tabled(rename = "Category")]
    category: &'a str,
}

pub async fn run(settings: &Settings, api: bool, json: bool) -> Result<(), CliError> {
    let config = settings.load()?;
    let namespace = config.namespace.clone();
    let analyzer = super::cluster_analyzer(config);
    let cancel = super::cancel_on_ctrl_c();

    let pods: Vec<PodDescriptor> = if api {
        analyzer.discover_api_pods(&cancel).await?
    } else {
        analyzer.discover_pods(&cancel).await?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&pods)?);
        return Ok(());
    }

    if pods.is_empty() {
        println!("[podlog] No matching pods in namespace '{namespace}'");
        return Ok(());
    }

    let rows = pods.iter().map(|p| PodRow {
        name: &p.name,
        service: &p.service,
        category: p.category.as_str(),
    });
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}
