use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use weave_analyzer::{ConflictType, ImpactLevel, Severity};
use weave_common::{ErrorKind, WeaveError};
use weave_core::{Token, TokenType};
use weave_engine::{
    Engine, EngineConfig, ExecutionOutcome, ExecutionReport, GraphRequest, SimulationStatus,
};

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn scan(engine: &mut Engine, dir: &Path, formats: &[&str]) {
    engine
        .build_dependency_graph(GraphRequest {
            codebase_path: dir.to_path_buf(),
            token_formats: formats.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        })
        .unwrap();
}

fn executed(outcome: ExecutionOutcome) -> ExecutionReport {
    match outcome {
        ExecutionOutcome::Executed(report) => report,
        ExecutionOutcome::Preview(preview) => panic!("expected execution, got preview {:?}", preview),
    }
}

#[tokio::test]
async fn test_color_change_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "a.css", ".x { color: #FFFFFF; }\n");

    let mut engine = Engine::new(EngineConfig::default());
    engine.upsert_token(Token::new("color-primary", "primary", TokenType::Color, "#ffffff"));
    scan(&mut engine, dir.path(), &["css-variables", "css-value"]);
    assert!(engine.graph().usage_count("color-primary") >= 1);

    let sim = engine
        .simulate_token_change("color-primary", "#000000", None, false)
        .await
        .unwrap();
    let critical: Vec<_> = sim
        .conflicts
        .iter()
        .filter(|c| c.conflict_type == ConflictType::Accessibility && c.severity == Severity::Critical)
        .collect();
    assert_eq!(critical.len(), 1);

    let applied = executed(engine.apply_token_change(&sim.simulation_id, true).await.unwrap());
    assert!(applied.success);
    assert_eq!(fs::read_to_string(&file).unwrap(), ".x { color: #000000; }\n");
    assert_eq!(engine.registry().get("color-primary").unwrap().value, "#000000");

    let rolled = executed(engine.rollback_token_change(&sim.simulation_id, true).await.unwrap());
    assert!(rolled.success);
    assert_eq!(rolled.status, SimulationStatus::RolledBack);
    assert_eq!(fs::read_to_string(&file).unwrap(), ".x { color: #FFFFFF; }\n");
    assert_eq!(engine.registry().get("color-primary").unwrap().value, "#ffffff");
}

#[tokio::test]
async fn test_spacing_change_across_files_with_history() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "a.css", ".a {\n  padding: 16px;\n}\n");
    let b = write(dir.path(), "b.css", ".b {\n  gap: 16px;\n}\n");
    let (orig_a, orig_b) = (fs::read(&a).unwrap(), fs::read(&b).unwrap());

    let mut engine = Engine::new(EngineConfig::default());
    engine.upsert_token(Token::new("spacing-md", "md", TokenType::Spacing, "16px"));
    scan(&mut engine, dir.path(), &[]);

    let sim = engine
        .simulate_token_change("spacing-md", "24px", None, false)
        .await
        .unwrap();
    assert_eq!(sim.impact_level, ImpactLevel::Low);
    assert_eq!(sim.files.len(), 2);

    executed(engine.apply_token_change(&sim.simulation_id, true).await.unwrap());
    assert_eq!(fs::read_to_string(&a).unwrap(), ".a {\n  padding: 24px;\n}\n");
    assert_eq!(fs::read_to_string(&b).unwrap(), ".b {\n  gap: 24px;\n}\n");

    executed(engine.rollback_token_change(&sim.simulation_id, true).await.unwrap());
    assert_eq!(fs::read(&a).unwrap(), orig_a);
    assert_eq!(fs::read(&b).unwrap(), orig_b);

    let statuses: Vec<_> = engine
        .history_for(&sim.simulation_id)
        .iter()
        .map(|e| e.status)
        .collect();
    assert_eq!(
        statuses,
        vec![
            SimulationStatus::Simulated,
            SimulationStatus::Applied,
            SimulationStatus::RolledBack
        ]
    );
}

#[tokio::test]
async fn test_large_spacing_jump_is_a_layout_conflict() {
    let mut engine = Engine::new(EngineConfig::default());
    engine.upsert_token(Token::new("spacing-xl", "xl", TokenType::Spacing, "10px"));

    let sim = engine
        .simulate_token_change("spacing-xl", "80px", None, false)
        .await
        .unwrap();
    assert_eq!(sim.conflicts.len(), 1);
    assert_eq!(sim.conflicts[0].conflict_type, ConflictType::Layout);
    assert_eq!(sim.conflicts[0].severity, Severity::High);

    let token = engine.registry().get("spacing-xl").unwrap();
    assert_eq!((token.value.as_str(), token.version), ("10px", 1));
}

#[tokio::test]
async fn test_second_apply_is_rejected_without_writes() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "a.css", ".a { margin: 16px; }\n");

    let mut engine = Engine::new(EngineConfig::default());
    engine.upsert_token(Token::new("spacing-md", "md", TokenType::Spacing, "16px"));
    scan(&mut engine, dir.path(), &[]);
    let sim = engine
        .simulate_token_change("spacing-md", "20px", None, false)
        .await
        .unwrap();
    executed(engine.apply_token_change(&sim.simulation_id, true).await.unwrap());

    let bytes = fs::read(&file).unwrap();
    let mtime = fs::metadata(&file).unwrap().modified().unwrap();
    let err = engine
        .apply_token_change(&sim.simulation_id, true)
        .await
        .unwrap_err();
    assert!(matches!(err, WeaveError::AlreadyApplied { .. }));
    assert_eq!(fs::read(&file).unwrap(), bytes);
    assert_eq!(fs::metadata(&file).unwrap().modified().unwrap(), mtime);
}

#[tokio::test]
async fn test_rollback_of_unapplied_simulation() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "a.css", ".a { margin: 16px; }\n");

    let mut engine = Engine::new(EngineConfig::default());
    engine.upsert_token(Token::new("spacing-md", "md", TokenType::Spacing, "16px"));
    scan(&mut engine, dir.path(), &[]);
    let sim = engine
        .simulate_token_change("spacing-md", "20px", None, false)
        .await
        .unwrap();

    let err = engine
        .rollback_token_change(&sim.simulation_id, true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotApplied);
    assert_eq!(fs::read_to_string(&file).unwrap(), ".a { margin: 16px; }\n");
}

#[tokio::test]
async fn test_edits_run_bottom_up_within_each_file() {
    let dir = tempfile::tempdir().unwrap();
    let body = "/* header */\n\n.a { color: var(--brand, #3366ff); }\n\n\n\n.b { border-color: var(--brand, #3366ff); }\n";
    write(dir.path(), "one.css", body);
    write(dir.path(), "two.css", body);

    let mut engine = Engine::new(EngineConfig::default());
    engine.upsert_token(Token::new("brand", "brand", TokenType::Color, "#3366ff"));
    scan(&mut engine, dir.path(), &[]);

    let sim = engine
        .simulate_token_change("brand", "#ff3300", None, false)
        .await
        .unwrap();
    let report = executed(engine.apply_token_change(&sim.simulation_id, true).await.unwrap());

    assert_eq!(report.files.len(), 2);
    for file in &report.files {
        assert_eq!(file.lines, vec![7, 3]);
        let text = fs::read_to_string(&file.path).unwrap();
        assert!(text.contains(".a { color: var(--brand, #ff3300); }"));
        assert!(text.contains(".b { border-color: var(--brand, #ff3300); }"));
    }
}

#[tokio::test]
async fn test_successive_changes_unwind_in_reverse() {
    let dir = tempfile::tempdir().unwrap();
    let original = ".card {\r\n  padding: 16px;\r\n  margin: 16px 8px;\r\n}";
    let file = write(dir.path(), "card.css", original);

    let mut engine = Engine::new(EngineConfig::default());
    engine.upsert_token(Token::new("spacing-md", "md", TokenType::Spacing, "16px"));
    scan(&mut engine, dir.path(), &["css-value"]);

    let mut applied = Vec::new();
    for value in ["24px", "32px", "40px"] {
        let sim = engine
            .simulate_token_change("spacing-md", value, None, false)
            .await
            .unwrap();
        executed(engine.apply_token_change(&sim.simulation_id, true).await.unwrap());
        applied.push(sim.simulation_id);
    }
    assert!(fs::read_to_string(&file).unwrap().contains("padding: 40px;"));

    for id in applied.iter().rev() {
        executed(engine.rollback_token_change(id, true).await.unwrap());
    }
    assert_eq!(fs::read_to_string(&file).unwrap(), original);
    let token = engine.registry().get("spacing-md").unwrap();
    assert_eq!(token.value, "16px");
    assert_eq!(token.version, 7);
}

#[tokio::test]
async fn test_unconfirmed_apply_previews_only() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "a.css", ".a { gap: 16px; }\n");

    let mut engine = Engine::new(EngineConfig::default());
    engine.upsert_token(Token::new("spacing-md", "md", TokenType::Spacing, "16px"));
    scan(&mut engine, dir.path(), &[]);

    let sim = engine
        .call(
            "simulate_token_change",
            json!({ "tokenId": "spacing-md", "newValue": "24px", "includeVisualDiff": true }),
        )
        .await;
    let id = sim["simulationId"].as_str().unwrap().to_string();
    assert!(sim["files"][0]["diff"].as_str().unwrap().contains("+.a { gap: 24px; }"));

    let preview = engine
        .call("apply_token_change", json!({ "simulationId": id }))
        .await;
    assert_eq!(preview["outcome"], "preview");
    assert_eq!(preview["notice"]["kind"], "CONFIRMATION_REQUIRED");
    assert_eq!(fs::read_to_string(&file).unwrap(), ".a { gap: 16px; }\n");

    let listed = engine
        .call("list_token_simulations", json!({ "status": "simulated" }))
        .await;
    assert_eq!(listed["count"], 1);
}

#[tokio::test]
async fn test_history_by_status_after_apply_and_rollback() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.css", ".a { padding: 16px; }\n");
    write(dir.path(), "b.css", ".b { gap: 16px; }\n");

    let mut engine = Engine::new(EngineConfig::default());
    engine.upsert_token(Token::new("spacing-md", "md", TokenType::Spacing, "16px"));
    scan(&mut engine, dir.path(), &[]);

    let first = engine
        .simulate_token_change("spacing-md", "24px", Some("a.css"), false)
        .await
        .unwrap();
    assert_eq!(first.files.len(), 1);
    executed(engine.apply_token_change(&first.simulation_id, true).await.unwrap());
    executed(engine.rollback_token_change(&first.simulation_id, true).await.unwrap());
    let second = engine
        .simulate_token_change("spacing-md", "20px", None, false)
        .await
        .unwrap();

    let simulated: Vec<_> = engine
        .history_with_status(Some(SimulationStatus::Simulated))
        .iter()
        .map(|e| e.simulation_id.clone())
        .collect();
    assert_eq!(simulated, vec![first.simulation_id.clone(), second.simulation_id.clone()]);
    assert_eq!(engine.history_with_status(None).len(), 4);

    let listed = engine
        .call("list_token_simulations", json!({ "status": "rolled-back" }))
        .await;
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["history"].as_array().unwrap().len(), 1);
    assert_eq!(listed["history"][0]["simulationId"], first.simulation_id.as_str());
    assert_eq!(listed["history"][0]["status"], "rolled-back");

    let applied = engine
        .call("list_token_simulations", json!({ "status": "applied" }))
        .await;
    assert_eq!(applied["count"], 0);
    assert_eq!(applied["history"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_scan_forgets_removed_usages() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "a.css", ".a {\n  padding: 16px;\n  gap: 24px;\n}\n");

    let mut engine = Engine::new(EngineConfig::default());
    engine.upsert_token(Token::new("spacing-md", "md", TokenType::Spacing, "16px"));
    engine.upsert_token(Token::new("spacing-lg", "lg", TokenType::Spacing, "24px"));
    scan(&mut engine, dir.path(), &[]);
    assert_eq!(engine.graph().usage_count("spacing-md"), 1);

    fs::write(&file, ".a {\n  padding: 24px;\n  gap: 24px;\n}\n").unwrap();
    engine
        .build_dependency_graph(GraphRequest {
            codebase_path: dir.path().to_path_buf(),
            update_existing: true,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(engine.graph().usage_count("spacing-md"), 0);
    assert_eq!(engine.graph().usage_count("spacing-lg"), 2);

    let sim = engine
        .simulate_token_change("spacing-md", "18px", None, false)
        .await
        .unwrap();
    assert_eq!(sim.total_changes, 0);
}
