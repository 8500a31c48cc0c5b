pub mod aggregator;
pub mod analysis;
pub mod claude;
pub mod orchestrator;
pub mod providers;
pub mod relay;
pub mod resolver;

pub use aggregator::RetrievalAggregator;
pub use analysis::{AnalysisAdapter, Analyzer};
pub use claude::ClaudeClient;
pub use orchestrator::Orchestrator;
pub use providers::{providers_from_config, ProviderClient};
pub use relay::{HttpProgressRelay, ProgressSink};
pub use resolver::EntityResolver;
