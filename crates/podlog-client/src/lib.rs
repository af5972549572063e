pub mod cluster;
pub mod command;

pub use cluster::{parse_pod_listing, ClusterClient};
pub use command::{CliCommand, CommandOutput};

use chrono::{DateTime, SecondsFormat, Utc};

/// `--since-time` argument: RFC 3339 in UTC with a `Z` suffix.
pub fn since_time_arg(since: DateTime<Utc>) -> String {
    since.to_rfc3339_opts(SecondsFormat::Secs, true)
}
