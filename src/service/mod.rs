pub mod analysis;
pub mod jobs;
pub mod knowledge_graph;
pub mod report;
pub mod resolver;
pub mod traces;
pub mod workflow;

pub use analysis::{AnalysisError, AnalysisService};
pub use knowledge_graph::{BigdataKnowledgeGraph, Entity, KnowledgeGraph};
pub use traces::{TraceClient, TraceEventName};
pub use workflow::{Progress, WorkflowClient, WorkflowEngine};
