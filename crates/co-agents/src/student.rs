//! Student agent contract (spec.md §4.4).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use co_domain::agent::StatePatch;
use serde_json::Value;

use crate::llm::{GenerateRequest, LlmTool, NullSink, TokenSink};

pub struct StudentAgentInput<'a> {
    pub student_id: &'a str,
    pub system_prompt: String,
    pub user_prompt: String,
    /// Lines explicitly marked "Direct graph message:" / "Overheard graph
    /// message (low weight):" — the only knowledge the student may answer
    /// from (spec.md §4.4).
    pub allowed_knowledge: Vec<String>,
    pub seed: String,
}

#[derive(Debug, Clone, Default)]
pub struct AgentOutput {
    pub message: String,
    pub metadata: HashMap<String, Value>,
    pub state_patch: Option<StatePatch>,
}

#[async_trait]
pub trait StudentAgent: Send + Sync {
    async fn run(
        &self,
        input: StudentAgentInput<'_>,
        emit_token: Option<&(dyn TokenSink)>,
    ) -> AgentOutput;
}

/// Default implementation: delegates to an injected [`LlmTool`], but
/// enforces the "answer only from allowed_knowledge, or express
/// uncertainty" rule deterministically rather than trusting the model to
/// follow it — if there is nothing to answer from, no LLM call is made at
/// all.
pub struct DefaultStudentAgent {
    pub llm: Arc<dyn LlmTool>,
}

const UNCERTAIN_REPLIES: &[&str] = &[
    "I'm not sure, I didn't catch anything about that yet.",
    "Hmm, I don't think I heard that part.",
    "I don't know — nobody told me about this yet.",
];

impl DefaultStudentAgent {
    pub fn new(llm: Arc<dyn LlmTool>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl StudentAgent for DefaultStudentAgent {
    async fn run(
        &self,
        input: StudentAgentInput<'_>,
        emit_token: Option<&(dyn TokenSink)>,
    ) -> AgentOutput {
        if input.allowed_knowledge.is_empty() {
            let idx = (hash_pick(&input.seed) * UNCERTAIN_REPLIES.len() as f64) as usize;
            let text = UNCERTAIN_REPLIES[idx.min(UNCERTAIN_REPLIES.len() - 1)].to_string();
            if let Some(sink) = emit_token {
                sink.emit(&text);
            } else {
                NullSink.emit(&text);
            }
            return AgentOutput {
                message: text,
                metadata: HashMap::new(),
                state_patch: None,
            };
        }

        let user_prompt = format!(
            "{}\n\nKnowledge you may use ({} item(s)):\n{}",
            input.user_prompt,
            input.allowed_knowledge.len(),
            input.allowed_knowledge.join("\n")
        );

        let text = self
            .llm
            .generate(
                GenerateRequest {
                    system_prompt: &input.system_prompt,
                    user_prompt: &user_prompt,
                    seed: input.seed.clone(),
                },
                emit_token,
            )
            .await;

        AgentOutput {
            message: text,
            metadata: HashMap::new(),
            state_patch: None,
        }
    }
}

fn hash_pick(seed: &str) -> f64 {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(seed.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[0..8]);
    (u64::from_be_bytes(bytes) as f64) / (u64::MAX as f64)
}
