mod ledger_stats;
mod stats;
mod stats_config;
mod stats_enums;
mod stats_log_sink;

pub use ledger_stats::LedgerStats;
pub use stats::Stats;
pub use stats_config::StatsConfig;
pub use stats_enums::{DetailType, Direction, Sample, StatType};
pub use stats_log_sink::{StatCategory, StatEntry, StatFileWriter, StatsJsonWriter, StatsLogSink};
