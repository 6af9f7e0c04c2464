//! Read-only classroom/student persistence collaborator (spec.md §1: "the
//! persistence layer for classroom/student entities, a read-only
//! 'classroom loader' by id" — treated as an external interface).

use async_trait::async_trait;
use co_domain::agent::AgentKind;
use co_domain::error::{Error, Result};

/// One persisted student record, as loaded by id.
#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub db_id: String,
    pub kind: AgentKind,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct ClassroomRecord {
    pub id: String,
    pub topic: String,
    pub students: Vec<StudentRecord>,
}

#[async_trait]
pub trait ClassroomLoader: Send + Sync {
    async fn load(&self, classroom_id: &str) -> Result<ClassroomRecord>;
}

/// In-memory fixture loader for tests and the demo binary — the
/// classroom-orchestrator equivalent of a narrow adapter over the
/// workspace model's external-provider pattern (one trait, one concrete,
/// swappable implementation).
pub struct FixtureClassroomLoader {
    classrooms: Vec<ClassroomRecord>,
}

impl FixtureClassroomLoader {
    pub fn new(classrooms: Vec<ClassroomRecord>) -> Self {
        Self { classrooms }
    }

    /// A single "Fractions" classroom with three students spanning all
    /// three non-teacher `AgentKind`s, useful for demos and tests.
    pub fn fractions_demo() -> Self {
        Self::new(vec![ClassroomRecord {
            id: "classroom-fractions".into(),
            topic: "Fractions".into(),
            students: vec![
                StudentRecord {
                    db_id: "1".into(),
                    kind: AgentKind::Typical,
                    display_name: "Alice".into(),
                },
                StudentRecord {
                    db_id: "2".into(),
                    kind: AgentKind::Adhd,
                    display_name: "Bob".into(),
                },
                StudentRecord {
                    db_id: "3".into(),
                    kind: AgentKind::Autistic,
                    display_name: "Cara".into(),
                },
            ],
        }])
    }
}

#[async_trait]
impl ClassroomLoader for FixtureClassroomLoader {
    async fn load(&self, classroom_id: &str) -> Result<ClassroomRecord> {
        self.classrooms
            .iter()
            .find(|c| c.id == classroom_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("classroom {classroom_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixture_loads_known_classroom() {
        let loader = FixtureClassroomLoader::fractions_demo();
        let record = loader.load("classroom-fractions").await.unwrap();
        assert_eq!(record.students.len(), 3);
    }

    #[tokio::test]
    async fn fixture_rejects_unknown_classroom() {
        let loader = FixtureClassroomLoader::fractions_demo();
        let err = loader.load("missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
