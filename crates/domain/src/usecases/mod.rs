//! Application use cases / business logic

pub mod agents;
pub mod ingest;
pub mod llm_client;
pub mod planner;
pub mod publisher;
pub mod render;
pub mod scheduler;

pub use agents::{Critic, Orchestrator, Reviser, Writer};
pub use ingest::{IngestConfig, Ingestor};
pub use llm_client::{Generated, LlmClient};
pub use planner::{PlanError, PlanOutcome, Planner, PlannerConfig};
pub use publisher::{
    PublishError, PublishOutcome, PublisherConfig, SlotPublisher, TARGET_CHAT_SETTING,
};
pub use render::{RenderConfig, Renderer};
pub use scheduler::{Scheduler, SchedulerConfig};
