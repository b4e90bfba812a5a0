//! Sequential thinking engine.
//!
//! Adapts reasoning depth to query complexity and produces an auditable
//! thought trace. Each thought is one LLM call whose structured JSON reply
//! carries the stage, text, confidence, optional competing claims, and an
//! optional next-stage hint. Branches share ancestor thoughts by arena
//! reference.

mod complexity;
mod thought;

pub use complexity::assess;
pub use thought::{
    Complexity, ReasoningTrace, TerminationReason, Thought, ThoughtBudget, ThoughtId,
    ThoughtStage,
};

use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ThinkingConfig;
use crate::error::{CoreError, Result};
use crate::llm::{ChatMessage, CompletionRequest, LlmGateway};
use crate::retrieval::ContextBundle;

/// Per-run knobs, resolved by the coordinator from query options.
#[derive(Debug, Clone)]
pub struct ThinkingOptions {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Optional cap tightening the band's thought budget.
    pub max_thoughts: Option<usize>,
    /// Optional cap tightening the band's branch budget.
    pub branch_cap: Option<usize>,
}

/// Result of one reasoning session.
#[derive(Debug, Clone)]
pub struct ThinkingOutcome {
    pub answer: String,
    pub trace: ReasoningTrace,
    /// Bundle source ids the final answer cites.
    pub cited_sources: Vec<String>,
}

/// Structured stage reply expected from the model.
#[derive(Debug, Deserialize)]
struct StageReply {
    #[serde(default)]
    stage: Option<String>,
    text: String,
    confidence: f64,
    #[serde(default)]
    claims: Vec<Claim>,
    #[serde(default)]
    next_stage_hint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Claim {
    text: String,
    confidence: f64,
}

/// One line of reasoning working through the stage machine.
struct Branch {
    id: usize,
    next_stage: ThoughtStage,
    tip: Option<ThoughtId>,
    /// Claim this branch was spawned to pursue, injected into its prompts.
    seed_claim: Option<String>,
    revisions: u32,
    confidence_sum: f64,
    thought_count: usize,
    low_streak: u32,
    abandoned: bool,
    /// Terminal synthesis thought, once reached.
    terminal: Option<ThoughtId>,
}

impl Branch {
    fn root() -> Self {
        Self {
            id: 0,
            next_stage: ThoughtStage::Analysis,
            tip: None,
            seed_claim: None,
            revisions: 0,
            confidence_sum: 0.0,
            thought_count: 0,
            low_streak: 0,
            abandoned: false,
            terminal: None,
        }
    }

    fn spawn(id: usize, tip: ThoughtId, claim: String) -> Self {
        Self {
            id,
            next_stage: ThoughtStage::Validation,
            tip: Some(tip),
            seed_claim: Some(claim),
            revisions: 0,
            confidence_sum: 0.0,
            thought_count: 0,
            low_streak: 0,
            abandoned: false,
            terminal: None,
        }
    }
}

/// Complexity-adaptive, branching reasoning engine (C5).
pub struct ThinkingEngine {
    gateway: Arc<LlmGateway>,
}

impl ThinkingEngine {
    pub fn new(gateway: Arc<LlmGateway>) -> Self {
        Self { gateway }
    }

    /// Run a full reasoning session over the given context bundle.
    ///
    /// LLM transport failures propagate so the coordinator can fall back;
    /// cancellation yields a partial synthesis marked `interrupted`.
    pub async fn run(
        &self,
        query: &str,
        bundle: &ContextBundle,
        options: &ThinkingOptions,
        config: &ThinkingConfig,
        cancel: &CancellationToken,
    ) -> Result<ThinkingOutcome> {
        if query.trim().is_empty() {
            return Err(CoreError::InvalidArgument("query must not be empty".into()));
        }

        let complexity = complexity::assess(query, config);
        let mut budget = complexity.budget();
        if let Some(cap) = options.max_thoughts {
            budget.max_thoughts = budget.max_thoughts.min(cap.max(2));
            budget.min_thoughts = budget.min_thoughts.min(budget.max_thoughts);
        }
        if let Some(cap) = options.branch_cap {
            budget.max_branches = budget.max_branches.min(cap.max(1));
        }
        debug!(complexity = complexity.as_str(), max_thoughts = budget.max_thoughts, "session start");

        let mut thoughts: Vec<Thought> = Vec::new();
        let mut branches: Vec<Branch> = vec![Branch::root()];

        let mut index = 0;
        while index < branches.len() {
            loop {
                if cancel.is_cancelled() {
                    return Ok(self.partial(query, complexity, budget, thoughts, branches.len()));
                }
                // Leave room for this branch's synthesis and the final merge.
                let mut stage = branches[index].next_stage;
                if thoughts.len() + 2 >= budget.max_thoughts {
                    stage = ThoughtStage::Synthesis;
                }

                let reply = match self
                    .stage_call(query, bundle, stage, &thoughts, &branches[index], options, config, cancel)
                    .await
                {
                    Ok(reply) => reply,
                    Err(CoreError::Cancelled) => {
                        return Ok(self.partial(query, complexity, budget, thoughts, branches.len()));
                    }
                    Err(other) => return Err(other),
                };

                let id = ThoughtId(thoughts.len());
                let parents = branches[index].tip.into_iter().collect();
                thoughts.push(Thought {
                    id,
                    stage,
                    text: reply.text.clone(),
                    confidence: reply.confidence.clamp(0.0, 1.0),
                    parents,
                    branch: branches[index].id,
                });

                {
                    let branch = &mut branches[index];
                    branch.tip = Some(id);
                    branch.thought_count += 1;
                    branch.confidence_sum += reply.confidence.clamp(0.0, 1.0);
                    let running = branch.confidence_sum / branch.thought_count as f64;
                    if running < config.confidence_floor {
                        branch.low_streak += 1;
                    } else {
                        branch.low_streak = 0;
                    }
                    if branch.low_streak >= 2 && stage != ThoughtStage::Synthesis {
                        warn!(branch = branch.id, "branch abandoned below confidence floor");
                        branch.abandoned = true;
                        break;
                    }
                }

                match stage {
                    ThoughtStage::Analysis => branches[index].next_stage = ThoughtStage::Hypothesis,
                    ThoughtStage::Hypothesis => {
                        self.maybe_branch(&mut branches, id, &reply, budget, config);
                        branches[index].next_stage = ThoughtStage::Validation;
                    }
                    ThoughtStage::Validation => {
                        let hinted_revision = reply
                            .next_stage_hint
                            .as_deref()
                            .map(|h| h.eq_ignore_ascii_case("revision"))
                            .unwrap_or(false);
                        let needs_depth = thoughts.len() + 2 < budget.min_thoughts;
                        let branch = &mut branches[index];
                        if (hinted_revision || reply.confidence < 0.5 || needs_depth)
                            && branch.revisions < config.revision_cap
                        {
                            branch.next_stage = ThoughtStage::Revision;
                        } else {
                            branch.next_stage = ThoughtStage::Synthesis;
                        }
                    }
                    ThoughtStage::Revision => {
                        branches[index].revisions += 1;
                        branches[index].next_stage = ThoughtStage::Analysis;
                    }
                    ThoughtStage::Synthesis => {
                        branches[index].terminal = Some(id);
                        break;
                    }
                }
            }
            index += 1;
        }

        // -- Merge + final synthesis -------------------------------------
        let terminals: Vec<ThoughtId> = branches.iter().filter_map(|b| b.terminal).collect();
        let all_abandoned = terminals.is_empty();
        let merge_ids: Vec<ThoughtId> = if all_abandoned {
            // Fall back to the single best thought produced anywhere.
            thoughts
                .iter()
                .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
                .map(|t| vec![t.id])
                .unwrap_or_default()
        } else {
            terminals
        };

        let referenced: Vec<String> = bundle
            .entries
            .iter()
            .map(|e| e.source_id.clone())
            .filter(|id| {
                merge_ids
                    .iter()
                    .any(|t| thoughts[t.0].text.contains(id.as_str()))
            })
            .collect();

        let (mut answer, confidence) = match self
            .final_synthesis(query, bundle, &thoughts, &merge_ids, options, cancel)
            .await
        {
            Ok(pair) => pair,
            Err(CoreError::Cancelled) => {
                return Ok(self.partial(query, complexity, budget, thoughts, branches.len()));
            }
            Err(other) => return Err(other),
        };

        // The answer must cite every bundle entry a merged thought leaned on.
        let missing: Vec<&String> = referenced
            .iter()
            .filter(|id| !answer.contains(id.as_str()))
            .collect();
        if !missing.is_empty() {
            let list = missing
                .iter()
                .map(|id| format!("[{id}]"))
                .collect::<Vec<_>>()
                .join(", ");
            answer.push_str(&format!("\n\nSources: {list}"));
        }
        let cited_sources: Vec<String> = bundle
            .entries
            .iter()
            .map(|e| e.source_id.clone())
            .filter(|id| answer.contains(id.as_str()))
            .collect();

        let final_id = ThoughtId(thoughts.len());
        thoughts.push(Thought {
            id: final_id,
            stage: ThoughtStage::Synthesis,
            text: answer.clone(),
            confidence,
            parents: merge_ids,
            branch: 0,
        });

        let branch_count = branches.len();
        Ok(ThinkingOutcome {
            answer,
            trace: ReasoningTrace {
                complexity,
                budget,
                thoughts,
                branch_count,
                termination: if all_abandoned {
                    TerminationReason::Abandoned
                } else {
                    TerminationReason::Complete
                },
            },
            cited_sources,
        })
    }

    /// Open new branches for competing hypothesis claims above the split
    /// threshold. The first claim stays on the current branch.
    fn maybe_branch(
        &self,
        branches: &mut Vec<Branch>,
        hypothesis: ThoughtId,
        reply: &StageReply,
        budget: ThoughtBudget,
        config: &ThinkingConfig,
    ) {
        let competing: Vec<&Claim> = reply
            .claims
            .iter()
            .filter(|c| c.confidence >= config.split_threshold)
            .collect();
        if competing.len() < 2 {
            return;
        }
        for claim in competing.into_iter().skip(1) {
            if branches.len() >= budget.max_branches {
                break;
            }
            let id = branches.len();
            debug!(branch = id, claim = %claim.text, "opening branch for competing claim");
            branches.push(Branch::spawn(id, hypothesis, claim.text.clone()));
        }
    }

    /// One stage call: prompt, parse, one re-ask, then degraded heuristic.
    #[allow(clippy::too_many_arguments)]
    async fn stage_call(
        &self,
        query: &str,
        bundle: &ContextBundle,
        stage: ThoughtStage,
        thoughts: &[Thought],
        branch: &Branch,
        options: &ThinkingOptions,
        config: &ThinkingConfig,
        cancel: &CancellationToken,
    ) -> Result<StageReply> {
        let system = stage_instruction(stage);
        let user = stage_prompt(query, bundle, thoughts, branch, config.history_window);

        let mut messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        for attempt in 0..2 {
            let request = CompletionRequest {
                messages: messages.clone(),
                model: options.model.clone(),
                max_tokens: options.max_tokens,
                temperature: options.temperature,
            };
            let completion = self.gateway.complete(&request, cancel).await?;
            match parse_stage_reply(&completion.text) {
                Some(reply) => return Ok(reply),
                None if attempt == 0 => {
                    warn!(stage = %stage, "unparseable stage reply, re-asking");
                    messages.push(ChatMessage::assistant(completion.text));
                    messages.push(ChatMessage::user(
                        "Reply again with ONLY the JSON object described above.",
                    ));
                }
                None => {
                    // Degraded heuristic: keep the raw text at low confidence.
                    warn!(stage = %stage, "stage reply unparseable twice, degrading");
                    return Ok(StageReply {
                        stage: Some(stage.as_str().to_string()),
                        text: completion.text.trim().to_string(),
                        confidence: 0.4,
                        claims: Vec::new(),
                        next_stage_hint: None,
                    });
                }
            }
        }
        unreachable!("stage call loop always returns")
    }

    /// Final merge across branch terminals. Returns (answer, confidence).
    async fn final_synthesis(
        &self,
        query: &str,
        bundle: &ContextBundle,
        thoughts: &[Thought],
        merge_ids: &[ThoughtId],
        options: &ThinkingOptions,
        cancel: &CancellationToken,
    ) -> Result<(String, f64)> {
        if merge_ids.is_empty() {
            return Ok(("No conclusion could be reached.".to_string(), 0.0));
        }

        let conclusions = merge_ids
            .iter()
            .map(|id| format!("- {}", thoughts[id.0].text))
            .collect::<Vec<_>>()
            .join("\n");
        let user = format!(
            "Question: {query}\n\n{}\nCandidate conclusions:\n{conclusions}\n\n\
             Merge these into one final answer. Cite context ids in square \
             brackets, e.g. [notes.md], for every context entry you rely on.",
            context_section(bundle),
        );
        let request = CompletionRequest {
            messages: vec![
                ChatMessage::system(stage_instruction(ThoughtStage::Synthesis)),
                ChatMessage::user(user),
            ],
            model: options.model.clone(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        let completion = self.gateway.complete(&request, cancel).await?;
        match parse_stage_reply(&completion.text) {
            Some(reply) => Ok((reply.text, reply.confidence.clamp(0.0, 1.0))),
            None => {
                // A plain-prose final answer is still an answer.
                Ok((completion.text.trim().to_string(), 0.5))
            }
        }
    }

    /// Partial synthesis for an interrupted session.
    fn partial(
        &self,
        query: &str,
        complexity: Complexity,
        budget: ThoughtBudget,
        mut thoughts: Vec<Thought>,
        branch_count: usize,
    ) -> ThinkingOutcome {
        let best = thoughts
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .map(|t| (t.id, t.text.clone(), t.confidence));

        let (parents, text, confidence) = match best {
            Some((id, text, confidence)) => (vec![id], text, confidence),
            None => (
                Vec::new(),
                format!("Reasoning about \"{query}\" was interrupted before any conclusions."),
                0.0,
            ),
        };
        let answer = format!("[interrupted] {text}");
        thoughts.push(Thought {
            id: ThoughtId(thoughts.len()),
            stage: ThoughtStage::Synthesis,
            text: answer.clone(),
            confidence,
            parents,
            branch: 0,
        });

        ThinkingOutcome {
            answer,
            trace: ReasoningTrace {
                complexity,
                budget,
                thoughts,
                branch_count,
                termination: TerminationReason::Interrupted,
            },
            cited_sources: Vec::new(),
        }
    }
}

fn stage_instruction(stage: ThoughtStage) -> String {
    let task = match stage {
        ThoughtStage::Analysis => {
            "Break the question into its parts, constraints, and the facts needed to answer it."
        }
        ThoughtStage::Hypothesis => {
            "Propose candidate answers or approaches. List each as a claim with its own confidence."
        }
        ThoughtStage::Validation => {
            "Check the current hypothesis against the context and constraints. Surface any contradiction."
        }
        ThoughtStage::Revision => {
            "Revise the earlier analysis in light of the validation findings."
        }
        ThoughtStage::Synthesis => {
            "State the final answer for this line of reasoning, citing context ids in square brackets."
        }
    };
    format!(
        "You are the {stage} stage of a sequential reasoning engine. {task} \
         Respond with a single JSON object and nothing else: \
         {{\"stage\": \"{stage}\", \"text\": \"...\", \"confidence\": 0.0, \
         \"claims\": [{{\"text\": \"...\", \"confidence\": 0.0}}], \
         \"next_stage_hint\": \"validation|revision|synthesis\"}}. \
         \"claims\" may be empty outside the hypothesis stage; the hint is optional."
    )
}

fn context_section(bundle: &ContextBundle) -> String {
    if bundle.is_empty() {
        return "Context: (no retrieved context)\n".to_string();
    }
    let mut out = String::from("Context:\n");
    for entry in &bundle.entries {
        out.push_str(&format!("[{}] {}\n", entry.source_id, entry.snippet));
    }
    out
}

fn stage_prompt(
    query: &str,
    bundle: &ContextBundle,
    thoughts: &[Thought],
    branch: &Branch,
    history_window: usize,
) -> String {
    // Walk the parent chain from the branch tip for the bounded history.
    let mut history = Vec::new();
    let mut cursor = branch.tip;
    while let Some(id) = cursor {
        let thought = &thoughts[id.0];
        history.push(format!("[{}] {}", thought.stage, thought.text));
        if history.len() >= history_window {
            break;
        }
        cursor = thought.parents.first().copied();
    }
    history.reverse();

    let mut prompt = format!("Question: {query}\n\n{}", context_section(bundle));
    if !history.is_empty() {
        prompt.push_str("\nPrior thoughts:\n");
        prompt.push_str(&history.join("\n"));
        prompt.push('\n');
    }
    if let Some(claim) = &branch.seed_claim {
        prompt.push_str(&format!("\nFocus on this competing claim: {claim}\n"));
    }
    prompt
}

/// Extract and parse the structured reply from raw model output. Tolerates
/// prose or code fences around the JSON object.
fn parse_stage_reply(raw: &str) -> Option<StageReply> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<StageReply>(&raw[start..=end]).ok()
}

// ============================================================================
// TESTS
// ============================================================================
