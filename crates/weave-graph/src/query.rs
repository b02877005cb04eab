// Query utilities over graph usages

use crate::graph::DependencyGraph;
use weave_core::{TokenUsage, UsageContext, UsageType};

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Token(String),
    FileContains(String),
    Component(String),
    Context(UsageContext),
    UsageType(UsageType),
    MinConfidence(f64),
}

impl Condition {
    fn accepts(&self, usage: &TokenUsage) -> bool {
        match self {
            Condition::Token(id) => &usage.token_id == id,
            Condition::FileContains(part) => usage.file_path.to_string_lossy().contains(part.as_str()),
            Condition::Component(name) => &usage.component == name,
            Condition::Context(ctx) => usage.context == *ctx,
            Condition::UsageType(kind) => usage.usage_type == *kind,
            Condition::MinConfidence(min) => usage.confidence >= *min,
        }
    }
}

/// Query builder for usage searches. Conditions are ANDed.
#[derive(Debug, Clone, Default)]
pub struct UsageQuery {
    conditions: Vec<Condition>,
    include_potential: bool,
    limit: Option<usize>,
}

impl UsageQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token_id: &str) -> Self {
        self.conditions.push(Condition::Token(token_id.to_string()));
        self
    }

    /// Keep usages whose path contains `part`
    pub fn with_file(mut self, part: &str) -> Self {
        self.conditions
            .push(Condition::FileContains(part.to_string()));
        self
    }

    pub fn with_component(mut self, component: &str) -> Self {
        self.conditions
            .push(Condition::Component(component.to_string()));
        self
    }

    pub fn with_context(mut self, context: UsageContext) -> Self {
        self.conditions.push(Condition::Context(context));
        self
    }

    pub fn with_usage_type(mut self, usage_type: UsageType) -> Self {
        self.conditions.push(Condition::UsageType(usage_type));
        self
    }

    pub fn with_min_confidence(mut self, min: f64) -> Self {
        self.conditions.push(Condition::MinConfidence(min));
        self
    }

    /// Search potential usages too
    pub fn including_potential(mut self) -> Self {
        self.include_potential = true;
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn matches(&self, usage: &TokenUsage) -> bool {
        self.conditions.iter().all(|c| c.accepts(usage))
    }

    pub fn run<'g>(&self, graph: &'g DependencyGraph) -> Vec<&'g TokenUsage> {
        let potential: &[TokenUsage] = if self.include_potential {
            graph.potential_usages()
        } else {
            &[]
        };

        graph
            .usages()
            .iter()
            .chain(potential.iter())
            .filter(|u| self.matches(u))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}
