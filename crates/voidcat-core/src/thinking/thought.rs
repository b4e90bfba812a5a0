//! Thought DAG types.
//!
//! Thoughts are arena-allocated inside a session and addressed by stable
//! indices; a branch is a path through the arena, not a separate
//! container, so no cyclic ownership is needed.

use serde::Serialize;

/// Stable arena index of a thought within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ThoughtId(pub usize);

/// Reasoning stage of a thought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThoughtStage {
    Analysis,
    Hypothesis,
    Validation,
    Synthesis,
    Revision,
}

impl ThoughtStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThoughtStage::Analysis => "analysis",
            ThoughtStage::Hypothesis => "hypothesis",
            ThoughtStage::Validation => "validation",
            ThoughtStage::Synthesis => "synthesis",
            ThoughtStage::Revision => "revision",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "analysis" => Some(ThoughtStage::Analysis),
            "hypothesis" => Some(ThoughtStage::Hypothesis),
            "validation" => Some(ThoughtStage::Validation),
            "synthesis" => Some(ThoughtStage::Synthesis),
            "revision" => Some(ThoughtStage::Revision),
            _ => None,
        }
    }
}

impl std::fmt::Display for ThoughtStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable reasoning step.
#[derive(Debug, Clone, Serialize)]
pub struct Thought {
    pub id: ThoughtId,
    pub stage: ThoughtStage,
    pub text: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Parent thoughts, always emitted earlier than this one.
    pub parents: Vec<ThoughtId>,
    /// Branch this thought belongs to.
    pub branch: usize,
}

/// Query complexity band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Medium,
    High,
    Expert,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Medium => "medium",
            Complexity::High => "high",
            Complexity::Expert => "expert",
        }
    }

    /// Thought budget for the band.
    pub fn budget(&self) -> ThoughtBudget {
        match self {
            Complexity::Simple => ThoughtBudget { min_thoughts: 3, max_thoughts: 5, max_branches: 1 },
            Complexity::Medium => ThoughtBudget { min_thoughts: 5, max_thoughts: 8, max_branches: 2 },
            Complexity::High => ThoughtBudget { min_thoughts: 8, max_thoughts: 14, max_branches: 3 },
            Complexity::Expert => ThoughtBudget { min_thoughts: 12, max_thoughts: 20, max_branches: 4 },
        }
    }
}

/// Thought and branch limits for one session.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ThoughtBudget {
    pub min_thoughts: usize,
    pub max_thoughts: usize,
    pub max_branches: usize,
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminationReason {
    /// Ran to synthesis.
    Complete,
    /// Cancelled mid-flight; partial synthesis emitted.
    Interrupted,
    /// Every branch fell below the confidence floor.
    Abandoned,
}

/// The full audit trace of one reasoning session.
#[derive(Debug, Clone, Serialize)]
pub struct ReasoningTrace {
    pub complexity: Complexity,
    pub budget: ThoughtBudget,
    pub thoughts: Vec<Thought>,
    pub branch_count: usize,
    pub termination: TerminationReason,
}

impl ReasoningTrace {
    /// Stage names that appear in the trace, deduplicated in first-seen
    /// order.
    pub fn stages_covered(&self) -> Vec<&'static str> {
        let mut seen = Vec::new();
        for thought in &self.thoughts {
            let name = thought.stage.as_str();
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    }
}

// ============================================================================
// TESTS
// ============================================================================
