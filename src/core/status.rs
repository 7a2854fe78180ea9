use super::ParseEnumError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Three-state progress marker shared by goals and milestones.
///
/// The checkbox in the UI cycles through the states in declaration order and
/// wraps around after `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn next(self) -> Self {
        match self {
            Self::NotStarted => Self::InProgress,
            Self::InProgress => Self::Completed,
            Self::Completed => Self::NotStarted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not-started",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for ProgressStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not-started" => Ok(Self::NotStarted),
            "in-progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            _ => Err(ParseEnumError::new("status", s)),
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_cycles_back_to_start() {
        let mut status = ProgressStatus::NotStarted;
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(status);
            status = status.next();
        }
        assert_eq!(
            seen,
            vec![
                ProgressStatus::NotStarted,
                ProgressStatus::InProgress,
                ProgressStatus::Completed,
                ProgressStatus::NotStarted,
            ]
        );
    }

    #[test]
    fn serde_uses_kebab_case_labels() {
        let json = serde_json::to_string(&ProgressStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        let parsed: ProgressStatus = serde_json::from_str("\"not-started\"").unwrap();
        assert_eq!(parsed, ProgressStatus::NotStarted);
        assert_eq!("completed".parse(), Ok(ProgressStatus::Completed));
        assert_eq!(
            "done".parse::<ProgressStatus>(),
            Err(ParseEnumError::new("status", "done"))
        );
    }
}
