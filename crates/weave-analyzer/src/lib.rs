pub mod conflicts;
pub mod health;
pub mod impact;
pub mod migration;

pub use conflicts::{Conflict, ConflictAnalyzer, ConflictType, Severity};
pub use health::{assess, HealthCheck, HealthIssue, HealthReport, ReportFormat};
pub use impact::{AffectedFile, EdgeCase, EdgeCaseKind, ImpactAnalysis, ImpactAnalyzer, ImpactCounts, ImpactLevel};
pub use migration::{plan, MigrationPhase, MigrationPlan, MigrationStrategy};
