pub mod config;
pub mod engine;
pub mod executor;
pub mod history;
pub mod ingest;
pub mod simulation;
pub mod store;
pub mod tools;

pub use config::{DriftPolicy, EngineConfig};
pub use engine::{
    is_guidance, Engine, ExtractReport, GraphReport, GraphRequest, SimulatedFile,
    SimulationListing, SimulationReport,
};
pub use executor::{ChangePreview, Direction, ExecutionOutcome, ExecutionReport, FileOutcome};
pub use history::{HistoryEntry, HistoryLog};
pub use ingest::{DesignNode, DesignSource, ExtractOptions, JsonFileSource, StaticSource};
pub use simulation::{FileChange, FileError, LineChange, Simulation, SimulationStatus};
pub use store::{EngineSnapshot, MemoryStore, SqliteStore, StateStore};
pub use tools::ToolCall;
