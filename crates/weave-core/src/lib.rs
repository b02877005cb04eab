pub mod normalizer;
pub mod registry;
pub mod scanner;
pub mod types;

pub use registry::{TokenRegistry, UpsertOutcome};
pub use scanner::{ScanConfig, SourceScanner};
pub use types::*;
