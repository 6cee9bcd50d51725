//! Application use cases / business logic

pub mod analyze;
pub mod collect;

pub use analyze::{AnalyzeOptions, AnalyzerConfig, HashtagAnalyzer};
pub use collect::{CollectionCounters, CollectorConfig, HistoryCollector, StatsScope};
