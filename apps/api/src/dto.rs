use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_application::{ApplyRestrictionInput, ReleaseRestrictionInput};
use warden_domain::Restriction;

/// Apply-restriction request payload.
#[derive(Debug, Deserialize)]
pub struct ApplyRestrictionRequest {
    pub subject_id: String,
    pub duration_minutes: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

impl From<ApplyRestrictionRequest> for ApplyRestrictionInput {
    fn from(value: ApplyRestrictionRequest) -> Self {
        Self {
            subject_id: value.subject_id,
            duration_minutes: value.duration_minutes,
            reason: value.reason,
        }
    }
}

/// Optional release and cancel payload.
#[derive(Debug, Default, Deserialize)]
pub struct ReleaseRestrictionRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

impl ReleaseRestrictionRequest {
    pub fn into_input(self, subject_id: String) -> ReleaseRestrictionInput {
        ReleaseRestrictionInput {
            subject_id,
            reason: self.reason,
        }
    }
}

/// API representation of one restriction.
#[derive(Debug, Serialize)]
pub struct RestrictionResponse {
    pub restriction_id: i64,
    pub group_id: String,
    pub subject_id: String,
    pub actor_id: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub removed_memberships: Vec<String>,
    pub status: &'static str,
    pub released_at: Option<DateTime<Utc>>,
    pub release_trigger: Option<&'static str>,
    pub released_by: Option<String>,
    pub release_reason: Option<String>,
    pub restore_count: i32,
}

impl From<Restriction> for RestrictionResponse {
    fn from(value: Restriction) -> Self {
        Self {
            restriction_id: value.restriction_id,
            group_id: value.group_id.as_str().to_owned(),
            subject_id: value.subject_id.as_str().to_owned(),
            removed_memberships: value.snapshot.to_strings(),
            actor_id: value.actor_id,
            reason: value.reason,
            created_at: value.created_at,
            ends_at: value.ends_at,
            duration_minutes: value.duration.as_minutes(),
            status: value.status.as_str(),
            released_at: value.released_at,
            release_trigger: value.release_trigger.map(|trigger| trigger.as_str()),
            released_by: value.released_by,
            release_reason: value.release_reason,
            restore_count: value.restore_count,
        }
    }
}

/// Per-dependency health detail.
#[derive(Debug, Serialize)]
pub struct HealthDependencyStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ready: bool,
    pub postgres: HealthDependencyStatus,
    pub armed_expiries: usize,
}

#[cfg(test)]
mod tests {
    use warden_application::ApplyRestrictionInput;

    use super::{ApplyRestrictionRequest, ReleaseRestrictionRequest};

    #[test]
    fn apply_request_reason_is_optional() {
        let request = serde_json::from_str::<ApplyRestrictionRequest>(
            r#"{"subject_id":"42","duration_minutes":10}"#,
        );
        let Ok(request) = request else {
            panic!("payload should parse: {request:?}");
        };

        let input = ApplyRestrictionInput::from(request);
        assert_eq!(input.subject_id, "42");
        assert_eq!(input.duration_minutes, 10);
        assert_eq!(input.reason, None);
    }

    #[test]
    fn release_request_carries_path_subject() {
        let input = ReleaseRestrictionRequest {
            reason: Some("appeal accepted".to_owned()),
        }
        .into_input("42".to_owned());

        assert_eq!(input.subject_id, "42");
        assert_eq!(input.reason.as_deref(), Some("appeal accepted"));
    }
}
