use crate::simulation::SimulationStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One status transition of a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub simulation_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: SimulationStatus,
    pub token_id: String,
    pub summary: String,
}

/// Append-only journal of simulation transitions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        Self { entries }
    }

    pub fn append(
        &mut self,
        simulation_id: &str,
        token_id: &str,
        status: SimulationStatus,
        summary: impl Into<String>,
    ) {
        self.entries.push(HistoryEntry {
            simulation_id: simulation_id.to_string(),
            timestamp: Utc::now(),
            status,
            token_id: token_id.to_string(),
            summary: summary.into(),
        });
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Entries with the given status, or all of them
    pub fn filter(&self, status: Option<SimulationStatus>) -> Vec<&HistoryEntry> {
        self.entries
            .iter()
            .filter(|e| status.map_or(true, |s| e.status == s))
            .collect()
    }

    pub fn for_simulation(&self, simulation_id: &str) -> Vec<&HistoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.simulation_id == simulation_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_by_status() {
        let mut log = HistoryLog::new();
        log.append("sim-1", "color-primary", SimulationStatus::Simulated, "simulated");
        log.append("sim-1", "color-primary", SimulationStatus::Applied, "applied");
        log.append("sim-2", "spacing-md", SimulationStatus::Simulated, "simulated");

        assert_eq!(log.filter(None).len(), 3);
        assert_eq!(log.filter(Some(SimulationStatus::Simulated)).len(), 2);
        let statuses: Vec<_> = log.for_simulation("sim-1").iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![SimulationStatus::Simulated, SimulationStatus::Applied]
        );
    }
}
