//! Teacher agent contract (spec.md §4.5).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{GenerateRequest, LlmTool, TokenSink};
use crate::student::AgentOutput;

pub struct TeacherAgentInput {
    pub system_prompt: String,
    pub user_prompt: String,
    pub seed: String,
}

#[async_trait]
pub trait TeacherAgent: Send + Sync {
    async fn run(
        &self,
        input: TeacherAgentInput,
        emit_token: Option<&(dyn TokenSink)>,
    ) -> AgentOutput;
}

/// The teacher agent has no analogue to the student's "no knowledge, must
/// express uncertainty" rule — the teacher prompt assembled upstream
/// (co-orchestrator's `prompt.rs`) already encodes every directive
/// (pacing, lesson goal, clarification/check-question instructions), so
/// this is a thin pass-through to the language model.
pub struct DefaultTeacherAgent {
    pub llm: Arc<dyn LlmTool>,
}

impl DefaultTeacherAgent {
    pub fn new(llm: Arc<dyn LlmTool>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl TeacherAgent for DefaultTeacherAgent {
    async fn run(
        &self,
        input: TeacherAgentInput,
        emit_token: Option<&(dyn TokenSink)>,
    ) -> AgentOutput {
        let text = self
            .llm
            .generate(
                GenerateRequest {
                    system_prompt: &input.system_prompt,
                    user_prompt: &input.user_prompt,
                    seed: input.seed,
                },
                emit_token,
            )
            .await;

        AgentOutput {
            message: text,
            metadata: HashMap::<String, Value>::new(),
            state_patch: None,
        }
    }
}
