use crate::maturation::{RunSettings, RunStatus, StartRequest};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Scheduled,
    Running,
    Paused,
    Cancelled,
    Completed,
    Error,
}

impl ScheduleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Whether the schedule will never launch again.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed | Self::Error)
    }

    /// Schedule status for a run that reached `status`.
    pub fn from_run(status: RunStatus) -> Self {
        match status {
            RunStatus::Finished => Self::Completed,
            RunStatus::Stopped => Self::Cancelled,
            _ => Self::Error,
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A maturation run planned for a later start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaturationSchedule {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub sessions: Vec<String>,
    #[serde(default)]
    pub settings: RunSettings,
    pub start_at_ms: i64,
    pub status: ScheduleStatus,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl MaturationSchedule {
    pub fn new(
        name: impl Into<String>,
        sessions: Vec<String>,
        settings: RunSettings,
        start_at_ms: i64,
        now_ms: i64,
    ) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: id[..8].to_string(),
            name: name.into(),
            user_id: None,
            sessions,
            settings,
            start_at_ms,
            status: ScheduleStatus::Scheduled,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            last_run_id: None,
            last_error: None,
        }
    }

    pub fn is_due(&self, now_ms: i64) -> bool {
        self.status == ScheduleStatus::Scheduled && self.start_at_ms <= now_ms
    }

    pub fn start_request(&self) -> StartRequest {
        let mut req = StartRequest::new(self.sessions.clone(), self.settings.clone());
        req.user_id = self.user_id.clone();
        req
    }
}

/// On-disk schedule list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleStore {
    pub version: u32,
    #[serde(default)]
    pub schedules: Vec<MaturationSchedule>,
}

impl Default for ScheduleStore {
    fn default() -> Self {
        Self {
            version: 1,
            schedules: Vec::new(),
        }
    }
}
