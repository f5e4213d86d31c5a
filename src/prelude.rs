//! Convenience imports for building an orchestrator deployment.
//!
//! ```ignore
//! use ragna_orchestrator::prelude::*;
//! ```

pub use crate::config::Config;
pub use crate::gateway::{Conversation, ConversationMessage, GatewayConfig, ModelGateway, SessionBudget};
pub use crate::memory::{CollectiveStore, UserMemoryStore};
pub use crate::metrics::{evaluate_health, HealthReport, HealthState, MetricsRegistry};
pub use crate::orchestrator::{Orchestrator, OrchestratorConfig};
pub use crate::reasoning::LoopConfig;
pub use crate::retrieval::{HybridRetriever, KnowledgeGraphIndex};
pub use crate::routing::IntentClassifier;
pub use crate::tools::ToolRegistry;
pub use crate::types::{AccessTier, QueryEnvelope, StreamEvent};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prelude_imports_compile() {
        let _config = Config::default();
        let _loop_config = LoopConfig::default();
        let _registry = ToolRegistry::new();
        let _metrics = MetricsRegistry::new();
    }
}
