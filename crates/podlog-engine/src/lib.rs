pub mod analyzer;
pub mod classifier;
pub mod dedup;
pub mod extract;
pub mod format;
pub mod level;
pub mod normalize;
pub mod request;
pub mod similarity;
pub mod summary;

pub use analyzer::{scan_text, Analyzer};
pub use classifier::PodClassifier;
pub use dedup::{rank_groups, Deduplicator, GreedyClusterer};
pub use extract::ErrorExtractor;
pub use level::LevelDetector;
pub use normalize::normalize;
pub use request::{RequestParser, RequestPattern};
pub use similarity::{sequence_ratio, SequenceRatio, Similarity};
pub use summary::{ErrorAnalysis, PodFailure, RequestAnalysis};
