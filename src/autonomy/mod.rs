//! The closed mission loop: project, plan, govern, execute, verify.

pub mod execution;
pub mod governance;
pub mod mission_graph;
pub mod orchestrator;
pub mod planner;
pub mod projector;
pub mod verification;

pub use execution::{CancelToken, ExecutionBatch, ExecutionEngine, SimulatedExecutor, TaskExecutor, TaskRun};
pub use governance::GovernanceGate;
pub use mission_graph::{EngineSettings, MissionGraph, UpsertOptions};
pub use orchestrator::{CycleResult, LoopOrchestrator};
pub use planner::TaskPlanner;
pub use projector::{HeuristicProjector, OutcomeProjector};
pub use verification::VerificationEngine;
