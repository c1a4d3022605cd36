//! Change coalescing, incremental graph updates and filesystem watching

pub mod analyzer;
pub mod coalescer;
pub mod orchestrator;
pub mod watcher;


pub use analyzer::{AnalysisOutput, AnalysisRequest, FileAnalyzer};
pub use coalescer::{ChangeCoalescer, Clock, CoalescerState, ManualClock, SystemClock};
pub use orchestrator::{OrchestratorState, UpdateOrchestrator};
pub use watcher::{PathFilter, WatchService, route_event};
