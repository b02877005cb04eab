use crate::impact::{AffectedFile, ImpactAnalysis, ImpactLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use weave_common::WeaveError;

/// Components per phase in a gradual rollout
const COMPONENTS_PER_PHASE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationStrategy {
    Gradual,
    Atomic,
    FeatureFlag,
}

impl MigrationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStrategy::Gradual => "gradual",
            MigrationStrategy::Atomic => "atomic",
            MigrationStrategy::FeatureFlag => "feature-flag",
        }
    }
}

impl FromStr for MigrationStrategy {
    type Err = WeaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "gradual" => Ok(MigrationStrategy::Gradual),
            "atomic" => Ok(MigrationStrategy::Atomic),
            "feature-flag" | "featureflag" => Ok(MigrationStrategy::FeatureFlag),
            other => Err(WeaveError::invalid_value(
                other,
                "expected gradual, atomic or feature-flag",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationPhase {
    pub name: String,
    pub description: String,
    pub files: Vec<PathBuf>,
    pub steps: Vec<String>,
}

/// Structured plan for rolling out one analyzed change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationPlan {
    pub analysis_id: String,
    pub token_id: String,
    pub strategy: MigrationStrategy,
    pub old_value: String,
    pub new_value: String,
    pub risk: ImpactLevel,
    pub phases: Vec<MigrationPhase>,
    pub css_snippet: String,
    pub rollback_note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs: Option<String>,
}

/// Build a migration plan from a stored analysis
pub fn plan(
    analysis: &ImpactAnalysis,
    strategy: MigrationStrategy,
    include_tests: bool,
    include_docs: bool,
) -> MigrationPlan {
    let phases = match strategy {
        MigrationStrategy::Atomic => atomic_phases(analysis),
        MigrationStrategy::Gradual => gradual_phases(analysis),
        MigrationStrategy::FeatureFlag => feature_flag_phases(analysis),
    };

    MigrationPlan {
        analysis_id: analysis.id.clone(),
        token_id: analysis.token_id.clone(),
        strategy,
        old_value: analysis.old_value.clone(),
        new_value: analysis.new_value.clone(),
        risk: analysis.risk,
        phases,
        css_snippet: css_snippet(analysis, strategy),
        rollback_note: format!(
            "Roll back with rollback_token_change on each applied simulation; {} returns to {}",
            analysis.token_id, analysis.old_value
        ),
        tests: include_tests.then(|| test_checklist(analysis)),
        docs: include_docs.then(|| docs_section(analysis, strategy)),
    }
}

fn all_files(analysis: &ImpactAnalysis) -> Vec<PathBuf> {
    analysis.affected_files.iter().map(|f| f.path.clone()).collect()
}

fn atomic_phases(analysis: &ImpactAnalysis) -> Vec<MigrationPhase> {
    vec![MigrationPhase {
        name: "apply".to_string(),
        description: format!(
            "Change {} to {} in every affected file at once",
            analysis.token_id, analysis.new_value
        ),
        files: all_files(analysis),
        steps: vec![
            format!(
                "simulate_token_change {} {}",
                analysis.token_id, analysis.new_value
            ),
            "Review the simulated diff".to_string(),
            "apply_token_change with confirmApply".to_string(),
        ],
    }]
}

fn gradual_phases(analysis: &ImpactAnalysis) -> Vec<MigrationPhase> {
    let mut by_component: BTreeMap<&str, Vec<&AffectedFile>> = BTreeMap::new();
    for file in &analysis.affected_files {
        by_component.entry(file.component.as_str()).or_default().push(file);
    }
    let components: Vec<(&str, Vec<&AffectedFile>)> = by_component.into_iter().collect();

    if components.is_empty() {
        return atomic_phases(analysis);
    }

    components
        .chunks(COMPONENTS_PER_PHASE)
        .enumerate()
        .map(|(i, batch)| {
            let names: Vec<&str> = batch.iter().map(|(name, _)| *name).collect();
            MigrationPhase {
                name: format!("phase-{}", i + 1),
                description: format!("Migrate {}", names.join(", ")),
                files: batch
                    .iter()
                    .flat_map(|(_, files)| files.iter().map(|f| f.path.clone()))
                    .collect(),
                steps: vec![
                    format!(
                        "simulate_token_change {} {} with scope set to each component",
                        analysis.token_id, analysis.new_value
                    ),
                    "Apply, then verify the components visually".to_string(),
                    "Continue with the next phase only when this one is stable".to_string(),
                ],
            }
        })
        .collect()
}

fn flag_name(token_id: &str) -> String {
    format!("ff-{}", token_id)
}

fn feature_flag_phases(analysis: &ImpactAnalysis) -> Vec<MigrationPhase> {
    let flag = flag_name(&analysis.token_id);
    vec![
        MigrationPhase {
            name: "introduce-flag".to_string(),
            description: format!("Define both values and switch on [data-{}]", flag),
            files: Vec::new(),
            steps: vec![
                "Add the CSS snippet to the global stylesheet".to_string(),
                format!("Register the {} flag, off by default", flag),
            ],
        },
        MigrationPhase {
            name: "guarded-rollout".to_string(),
            description: "Enable the flag for a growing share of users".to_string(),
            files: all_files(analysis),
            steps: vec![
                "Enable for internal users and watch for regressions".to_string(),
                "Ramp up the rollout".to_string(),
            ],
        },
        MigrationPhase {
            name: "cleanup".to_string(),
            description: format!(
                "Make {} the token value and remove the flag",
                analysis.new_value
            ),
            files: all_files(analysis),
            steps: vec![
                "apply_token_change with confirmApply".to_string(),
                format!("Delete the {} selector and flag", flag),
            ],
        },
    ]
}

fn css_snippet(analysis: &ImpactAnalysis, strategy: MigrationStrategy) -> String {
    let var = format!("--{}", analysis.token_id);
    match strategy {
        MigrationStrategy::FeatureFlag => format!(
            ":root {{\n  {var}: {old};\n}}\n\n[data-{flag}] {{\n  {var}: {new};\n}}\n",
            var = var,
            old = analysis.old_value,
            new = analysis.new_value,
            flag = flag_name(&analysis.token_id)
        ),
        _ => format!(
            ":root {{\n  /* was {old} */\n  {var}: {new};\n}}\n",
            var = var,
            old = analysis.old_value,
            new = analysis.new_value
        ),
    }
}

fn test_checklist(analysis: &ImpactAnalysis) -> Vec<String> {
    let mut tests = vec![format!(
        "Snapshot the components using {} before and after",
        analysis.token_id
    )];
    for file in &analysis.affected_files {
        tests.push(format!(
            "Visual check of {} ({} usage(s))",
            file.component, file.usages
        ));
    }
    if !analysis.conflicts.is_empty() {
        tests.push("Re-run the conflict checks on the final value".to_string());
    }
    tests
}

fn docs_section(analysis: &ImpactAnalysis, strategy: MigrationStrategy) -> String {
    let mut doc = format!(
        "## {}\n\nValue changes from `{}` to `{}` ({} rollout, risk {}).\n",
        analysis.token_id,
        analysis.old_value,
        analysis.new_value,
        strategy.as_str(),
        analysis.risk
    );
    if let Some(reason) = &analysis.change_reason {
        doc.push_str(&format!("\nReason: {}\n", reason));
    }
    doc.push_str(&format!(
        "\nAffects {} file(s) across {} component(s).\n",
        analysis.counts.files, analysis.counts.components
    ));
    doc
}
