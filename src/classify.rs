use std::collections::HashMap;

use thiserror::Error;

use crate::config::ClassificationConfig;
use crate::event::Stage;

/// Errors raised when a raw label has no configured mapping.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("status did not match any stage: {status:?}")]
    UnknownStatus { status: String },

    #[error("issue type did not match any group: {issue_type:?}")]
    UnknownIssueType { issue_type: String },
}

/// Maps raw workflow labels onto canonical stages, type groups and segments.
///
/// Built once from [`ClassificationConfig`]; lookups are pure.
#[derive(Debug, Clone)]
pub struct Classifier {
    stages: HashMap<String, Stage>,
    type_groups: HashMap<String, String>,
    segment_label_prefix: String,
    default_tribe: String,
}

impl Classifier {
    /// Builds lookup tables from the classification configuration.
    pub fn new(cfg: &ClassificationConfig) -> Self {
        let mut stages = HashMap::new();
        for (stage, statuses) in &cfg.statuses {
            for status in statuses {
                stages.insert(status.clone(), *stage);
            }
        }

        let mut type_groups = HashMap::new();
        for (group, types) in &cfg.issue_types {
            for raw in types {
                type_groups.insert(to_underscore(raw), group.clone());
            }
        }

        Self {
            stages,
            type_groups,
            segment_label_prefix: cfg.segment_label_prefix.clone(),
            default_tribe: cfg.default_tribe.clone(),
        }
    }

    /// Maps a raw status to its stage. A missing status is the empty stage.
    pub fn stage(&self, status: Option<&str>) -> Result<Option<Stage>, ClassifyError> {
        let Some(status) = status else {
            return Ok(None);
        };

        self.stages
            .get(status)
            .copied()
            .map(Some)
            .ok_or_else(|| ClassifyError::UnknownStatus {
                status: status.to_string(),
            })
    }

    /// Maps a raw issue type to its type group.
    pub fn type_group(&self, issue_type: &str) -> Result<&str, ClassifyError> {
        self.type_groups
            .get(&to_underscore(issue_type))
            .map(String::as_str)
            .ok_or_else(|| ClassifyError::UnknownIssueType {
                issue_type: issue_type.to_string(),
            })
    }

    /// Maps a raw tribe to a segment label. Every tribe is accepted.
    pub fn segment(&self, tribe: Option<&str>) -> String {
        let tribe = tribe.unwrap_or(&self.default_tribe);
        format!("{}{}", self.segment_label_prefix, to_underscore(tribe))
    }
}

/// Lower-cases `s` and replaces whitespace, `-` and `/` with `_`.
pub fn to_underscore(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .map(|c| {
            if c.is_whitespace() || c == '-' || c == '/' {
                '_'
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn classifier() -> Classifier {
        let mut statuses = BTreeMap::new();
        statuses.insert(Stage::Backlog, vec!["Open".to_string(), "To Do".to_string()]);
        statuses.insert(Stage::Wip, vec!["In Progress".to_string()]);
        statuses.insert(Stage::Done, vec!["Ready for Release".to_string()]);
        statuses.insert(Stage::Resolved, vec!["Closed".to_string()]);

        let mut issue_types = BTreeMap::new();
        issue_types.insert(
            "product".to_string(),
            vec!["story".to_string(), "new_feature".to_string()],
        );
        issue_types.insert(
            "technical".to_string(),
            vec!["technical_task".to_string(), "sub_task".to_string()],
        );

        Classifier::new(&ClassificationConfig {
            statuses,
            issue_types,
            ..Default::default()
        })
    }

    #[test]
    fn test_stage_lookup() {
        let c = classifier();
        assert_eq!(c.stage(Some("Open")).unwrap(), Some(Stage::Backlog));
        assert_eq!(c.stage(Some("In Progress")).unwrap(), Some(Stage::Wip));
        assert_eq!(c.stage(None).unwrap(), None);
    }

    #[test]
    fn test_stage_is_case_sensitive() {
        let c = classifier();
        assert_eq!(
            c.stage(Some("open")),
            Err(ClassifyError::UnknownStatus {
                status: "open".to_string()
            })
        );
    }

    #[test]
    fn test_type_group_normalizes_raw_type() {
        let c = classifier();
        assert_eq!(c.type_group("New Feature").unwrap(), "product");
        assert_eq!(c.type_group("Sub-task").unwrap(), "technical");
        assert_eq!(c.type_group("Technical Task").unwrap(), "technical");
    }

    #[test]
    fn test_type_group_unknown() {
        let c = classifier();
        let err = c.type_group("Incident").unwrap_err();
        assert_eq!(err.to_string(), "issue type did not match any group: \"Incident\"");
    }

    #[test]
    fn test_segment() {
        let c = classifier();
        assert_eq!(c.segment(Some("Core Platform")), "tribe_core_platform");
        assert_eq!(c.segment(None), "tribe_none");
    }

    #[test]
    fn test_to_underscore() {
        assert_eq!(to_underscore("Sub-task"), "sub_task");
        assert_eq!(to_underscore("SSO Launch"), "sso_launch");
        assert_eq!(to_underscore("a/b c"), "a_b_c");
    }
}
