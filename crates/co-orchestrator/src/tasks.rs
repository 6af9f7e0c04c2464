//! Task-group normalization (spec.md §4.9.4).

use std::collections::HashSet;

use co_domain::error::{Error, Result};
use co_domain::task::{TaskGroup, TaskMode};

fn round_robin_groups(student_ids: &[String], num_groups: usize) -> Vec<TaskGroup> {
    let num_groups = num_groups.max(1).min(student_ids.len().max(1));
    let mut groups: Vec<TaskGroup> = (0..num_groups)
        .map(|i| TaskGroup {
            id: format!("group_{}", i + 1),
            student_ids: Vec::new(),
        })
        .collect();
    for (i, id) in student_ids.iter().enumerate() {
        groups[i % num_groups].student_ids.push(id.clone());
    }
    groups.retain(|g| !g.student_ids.is_empty());
    groups
}

/// Autonomous grouping for the unsupervised path (spec.md §4.9.1 step 8 /
/// §4.9.4). `individual` is trivial; `group` follows the literal
/// `max(2, ⌈N/3⌉)` target from spec.md. `pair` has no explicit auto-build
/// formula in spec.md — this extends the same round-robin shape with a
/// pair-sized target `max(2, ⌈N/2⌉)` (recorded as an implementer decision
/// in DESIGN.md).
pub fn auto_build_groups(mode: TaskMode, student_ids: &[String]) -> Vec<TaskGroup> {
    let n = student_ids.len();
    match mode {
        TaskMode::Individual => student_ids
            .iter()
            .map(|id| TaskGroup {
                id: format!("group_{id}"),
                student_ids: vec![id.clone()],
            })
            .collect(),
        TaskMode::Pair => {
            let target = (n.div_ceil(2)).max(2);
            round_robin_groups(student_ids, target)
        }
        TaskMode::Group => {
            let target = (n.div_ceil(3)).max(2);
            round_robin_groups(student_ids, target)
        }
    }
}

fn validate_no_duplicates(groups: &[TaskGroup]) -> Result<()> {
    let mut seen = HashSet::new();
    for g in groups {
        for id in &g.student_ids {
            if !seen.insert(id.clone()) {
                return Err(Error::InvalidArgument(format!(
                    "student {id} appears in more than one group"
                )));
            }
        }
    }
    Ok(())
}

/// Normalizes a supervisor-submitted `TaskAssignment`'s groups per spec.md
/// §4.9.4. `individual` always overrides whatever groups were supplied.
pub fn normalize_submitted_groups(
    mode: TaskMode,
    groups: Option<Vec<TaskGroup>>,
    student_ids: &[String],
) -> Result<Vec<TaskGroup>> {
    match mode {
        TaskMode::Individual => Ok(auto_build_groups(TaskMode::Individual, student_ids)),
        TaskMode::Pair => {
            let groups = groups.ok_or_else(|| Error::InvalidArgument("pair mode requires groups".into()))?;
            if groups.is_empty() {
                return Err(Error::InvalidArgument("pair mode requires groups".into()));
            }
            if let Some(oversized) = groups.iter().find(|g| g.student_ids.len() > 2) {
                return Err(Error::InvalidArgument(format!(
                    "pair group {} has more than 2 students",
                    oversized.id
                )));
            }
            validate_no_duplicates(&groups)?;
            Ok(groups)
        }
        TaskMode::Group => {
            let groups = groups.ok_or_else(|| Error::InvalidArgument("group mode requires groups".into()))?;
            if groups.is_empty() {
                return Err(Error::InvalidArgument("group mode requires groups".into()));
            }
            validate_no_duplicates(&groups)?;
            Ok(groups)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("student_agent_{i}")).collect()
    }

    #[test]
    fn individual_always_overrides_input() {
        let groups = normalize_submitted_groups(TaskMode::Individual, None, &ids(3)).unwrap();
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.student_ids.len() == 1));
    }

    #[test]
    fn pair_requires_groups() {
        let err = normalize_submitted_groups(TaskMode::Pair, None, &ids(4)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn pair_rejects_oversized_group() {
        let groups = vec![TaskGroup {
            id: "g1".into(),
            student_ids: ids(3),
        }];
        let err = normalize_submitted_groups(TaskMode::Pair, Some(groups), &ids(3)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn rejects_duplicate_student_across_groups() {
        let groups = vec![
            TaskGroup { id: "g1".into(), student_ids: vec!["student_agent_1".into()] },
            TaskGroup { id: "g2".into(), student_ids: vec!["student_agent_1".into()] },
        ];
        let err = normalize_submitted_groups(TaskMode::Group, Some(groups), &ids(2)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn auto_group_targets_max_two_or_n_over_three() {
        let groups = auto_build_groups(TaskMode::Group, &ids(9));
        assert_eq!(groups.len(), 3);
        let total: usize = groups.iter().map(|g| g.student_ids.len()).sum();
        assert_eq!(total, 9);
    }
}
