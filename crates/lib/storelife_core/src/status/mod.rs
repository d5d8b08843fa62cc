//! Status transition rules for business entities.
//!
//! Every entity type owns a fixed directed graph over its statuses, stored as
//! a static table in [`graphs`]. Lookups are pure: no I/O, no side effects.
//! Services call [`validate_transition`] before persisting a status change.

mod graphs;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Legal statuses and `(from, to)` edges for one entity type.
#[derive(Debug)]
pub struct TransitionTable {
    pub statuses: &'static [&'static str],
    pub edges: &'static [(&'static str, &'static str)],
}

impl TransitionTable {
    pub fn contains_status(&self, status: &str) -> bool {
        self.statuses.contains(&status)
    }

    pub fn initial_status(&self) -> &'static str {
        self.statuses[0]
    }

    /// Statuses with no outgoing edge.
    pub fn is_terminal(&self, status: &str) -> bool {
        self.contains_status(status) && !self.edges.iter().any(|(from, _)| *from == status)
    }
}

/// Status-bearing business entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    PreparationProject,
    EngineeringTask,
    EquipmentProcurement,
    LicenseApplication,
    StaffRecruitment,
    Milestone,
}

impl EntityType {
    pub const ALL: [EntityType; 6] = [
        EntityType::PreparationProject,
        EntityType::EngineeringTask,
        EntityType::EquipmentProcurement,
        EntityType::LicenseApplication,
        EntityType::StaffRecruitment,
        EntityType::Milestone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::PreparationProject => "PreparationProject",
            EntityType::EngineeringTask => "EngineeringTask",
            EntityType::EquipmentProcurement => "EquipmentProcurement",
            EntityType::LicenseApplication => "LicenseApplication",
            EntityType::StaffRecruitment => "StaffRecruitment",
            EntityType::Milestone => "Milestone",
        }
    }

    /// Kebab-case plural used in URL paths (e.g. `preparation-projects`).
    pub fn path_segment(&self) -> &'static str {
        match self {
            EntityType::PreparationProject => "preparation-projects",
            EntityType::EngineeringTask => "engineering-tasks",
            EntityType::EquipmentProcurement => "equipment-procurements",
            EntityType::LicenseApplication => "license-applications",
            EntityType::StaffRecruitment => "staff-recruitments",
            EntityType::Milestone => "milestones",
        }
    }

    pub fn from_path_segment(segment: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.path_segment() == segment)
    }

    /// Backing table name. Only ever one of these constants, never user input.
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityType::PreparationProject => "preparation_projects",
            EntityType::EngineeringTask => "engineering_tasks",
            EntityType::EquipmentProcurement => "equipment_procurements",
            EntityType::LicenseApplication => "license_applications",
            EntityType::StaffRecruitment => "staff_recruitments",
            EntityType::Milestone => "milestones",
        }
    }

    pub fn transitions(&self) -> &'static TransitionTable {
        match self {
            EntityType::PreparationProject => &graphs::PREPARATION_PROJECT,
            EntityType::EngineeringTask => &graphs::ENGINEERING_TASK,
            EntityType::EquipmentProcurement => &graphs::EQUIPMENT_PROCUREMENT,
            EntityType::LicenseApplication => &graphs::LICENSE_APPLICATION,
            EntityType::StaffRecruitment => &graphs::STAFF_RECRUITMENT,
            EntityType::Milestone => &graphs::MILESTONE,
        }
    }

    pub fn initial_status(&self) -> &'static str {
        self.transitions().initial_status()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s || t.path_segment() == s)
            .ok_or_else(|| StatusError::UnknownEntityType(s.to_string()))
    }
}

/// Status validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("Unknown status '{status}' for {entity_type}")]
    UnknownStatus {
        entity_type: EntityType,
        status: String,
    },

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        entity_type: EntityType,
        from: String,
        to: String,
    },
}

/// Whether `(from, to)` is an edge of the entity type's graph.
pub fn is_valid_transition(entity_type: EntityType, from: &str, to: &str) -> bool {
    entity_type
        .transitions()
        .edges
        .iter()
        .any(|(f, t)| *f == from && *t == to)
}

/// Statuses reachable in one step from `from`. Empty for terminal or unknown statuses.
pub fn available_transitions(entity_type: EntityType, from: &str) -> Vec<&'static str> {
    entity_type
        .transitions()
        .edges
        .iter()
        .filter(|(f, _)| *f == from)
        .map(|(_, t)| *t)
        .collect()
}

/// Like [`is_valid_transition`], but explains the rejection.
pub fn validate_transition(entity_type: EntityType, from: &str, to: &str) -> Result<(), StatusError> {
    let table = entity_type.transitions();
    if !table.contains_status(to) {
        return Err(StatusError::UnknownStatus {
            entity_type,
            status: to.to_string(),
        });
    }
    if !is_valid_transition(entity_type, from, to) {
        return Err(StatusError::InvalidTransition {
            entity_type,
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn every_edge_uses_declared_statuses() {
        for et in EntityType::ALL {
            let table = et.transitions();
            for (from, to) in table.edges {
                assert!(table.contains_status(from), "{et}: undeclared {from}");
                assert!(table.contains_status(to), "{et}: undeclared {to}");
            }
        }
    }

    #[test]
    fn every_status_is_reachable_from_initial() {
        for et in EntityType::ALL {
            let table = et.transitions();
            let mut seen = HashSet::from([table.initial_status()]);
            let mut frontier = vec![table.initial_status()];
            while let Some(status) = frontier.pop() {
                for next in available_transitions(et, status) {
                    if seen.insert(next) {
                        frontier.push(next);
                    }
                }
            }
            for status in table.statuses {
                assert!(seen.contains(status), "{et}: {status} unreachable");
            }
        }
    }

    #[test]
    fn validity_matches_table_for_all_pairs() {
        for et in EntityType::ALL {
            let table = et.transitions();
            for from in table.statuses {
                for to in table.statuses {
                    let expected = table.edges.contains(&(*from, *to));
                    assert_eq!(is_valid_transition(et, from, to), expected, "{et}: {from} -> {to}");
                    assert_eq!(validate_transition(et, from, to).is_ok(), expected);
                }
            }
        }
    }

    #[test]
    fn self_transitions_are_rejected() {
        for et in EntityType::ALL {
            for status in et.transitions().statuses {
                assert!(!is_valid_transition(et, status, status));
            }
        }
    }

    #[test]
    fn preparation_project_happy_path() {
        let et = EntityType::PreparationProject;
        assert_eq!(et.initial_status(), "DRAFT");
        assert!(!is_valid_transition(et, "DRAFT", "COMPLETED"));
        assert!(is_valid_transition(et, "DRAFT", "PLANNING"));
        assert!(is_valid_transition(et, "PLANNING", "IN_PROGRESS"));
        assert!(is_valid_transition(et, "IN_PROGRESS", "COMPLETED"));
        assert!(!is_valid_transition(et, "COMPLETED", "IN_PROGRESS"));
    }

    #[test]
    fn preparation_project_terminals_have_no_exits() {
        let table = EntityType::PreparationProject.transitions();
        assert!(table.is_terminal("COMPLETED"));
        assert!(table.is_terminal("CANCELLED"));
        assert!(!table.is_terminal("PAUSED"));
        assert!(available_transitions(EntityType::PreparationProject, "COMPLETED").is_empty());
    }

    #[test]
    fn paused_and_cancelled_are_side_branches() {
        let et = EntityType::PreparationProject;
        let table = et.transitions();
        for from in table.statuses.iter().filter(|s| !table.is_terminal(s)) {
            let exits = available_transitions(et, from);
            if *from != "PAUSED" {
                assert!(exits.contains(&"PAUSED"), "{from} cannot pause");
            }
            assert!(exits.contains(&"CANCELLED"), "{from} cannot be cancelled");
        }
        assert_eq!(
            available_transitions(et, "DRAFT"),
            vec!["PLANNING", "PAUSED", "CANCELLED"]
        );
        assert_eq!(
            available_transitions(et, "PAUSED"),
            vec!["DRAFT", "PLANNING", "IN_PROGRESS", "CANCELLED"]
        );
        assert!(!is_valid_transition(et, "PAUSED", "COMPLETED"));
        assert!(!is_valid_transition(et, "PAUSED", "PAUSED"));
    }

    #[test]
    fn validate_reports_details() {
        let err = validate_transition(EntityType::PreparationProject, "DRAFT", "COMPLETED")
            .unwrap_err();
        assert_eq!(
            err,
            StatusError::InvalidTransition {
                entity_type: EntityType::PreparationProject,
                from: "DRAFT".into(),
                to: "COMPLETED".into(),
            }
        );
        assert_eq!(err.to_string(), "invalid status transition from DRAFT to COMPLETED");

        let err = validate_transition(EntityType::Milestone, "PENDING", "SHIPPED").unwrap_err();
        assert!(matches!(err, StatusError::UnknownStatus { .. }));
    }

    #[test]
    fn unknown_from_status_has_no_transitions() {
        assert!(available_transitions(EntityType::Milestone, "NOPE").is_empty());
        assert!(!is_valid_transition(EntityType::Milestone, "NOPE", "IN_PROGRESS"));
    }

    #[test]
    fn entity_type_parses_from_name_and_path() {
        for et in EntityType::ALL {
            assert_eq!(et.as_str().parse::<EntityType>(), Ok(et));
            assert_eq!(EntityType::from_path_segment(et.path_segment()), Some(et));
        }
        assert!("Store".parse::<EntityType>().is_err());
    }
}
