pub mod lesson_plan;
pub mod llm;
pub mod rubric;
pub mod safety;
pub mod student;
pub mod teacher;

pub use llm::{DeterministicMockLlm, GenerateRequest, LlmTool, NullSink, TokenSink};
pub use safety::{RegexSafetyFilter, SafetyFilter, SafetyResult};
pub use student::{AgentOutput, DefaultStudentAgent, StudentAgent, StudentAgentInput};
pub use teacher::{DefaultTeacherAgent, TeacherAgent, TeacherAgentInput};
