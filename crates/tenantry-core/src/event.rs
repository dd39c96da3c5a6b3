//! Domain events emitted by the command handlers.
//!
//! One [`DomainEvent`] is produced per mutation. It carries the typed
//! payload encoded as JSON plus before/after snapshots of the aggregate for
//! audit diffing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TenantryError, TenantryResult};
use crate::models::environment::AutoArchive;
use crate::models::organization::AuthenticationType;
use crate::models::unix_now;

/// The caller a mutation is attributed to. Authentication happens upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Editor {
    pub email: String,
    pub is_admin: bool,
}

impl Editor {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            is_admin: false,
        }
    }

    pub fn admin(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            is_admin: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Organization,
    Project,
    Environment,
}

/// One variant per (entity, mutation) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Unknown,
    OrganizationCreated,
    OrganizationRenamed,
    OrganizationDescriptionChanged,
    OrganizationOwnerEmailChanged,
    OrganizationAuthenticationSettingsChanged,
    OrganizationEnabled,
    OrganizationDisabled,
    OrganizationArchived,
    OrganizationUnarchived,
    OrganizationTrialConverted,
    OrganizationUpdated,
    ProjectCreated,
    ProjectRenamed,
    ProjectDescriptionChanged,
    ProjectEnabled,
    ProjectDisabled,
    ProjectTrialConverted,
    ProjectUpdated,
    EnvironmentCreated,
    EnvironmentRenamed,
    EnvironmentDescriptionChanged,
    EnvironmentRequireCommentChanged,
    EnvironmentAutoArchiveChanged,
    EnvironmentArchived,
    EnvironmentUnarchived,
    EnvironmentUpdated,
}

impl EventType {
    const CODES: [(EventType, i32); 27] = [
        (Self::Unknown, 0),
        (Self::OrganizationCreated, 1),
        (Self::OrganizationRenamed, 2),
        (Self::OrganizationDescriptionChanged, 3),
        (Self::OrganizationOwnerEmailChanged, 4),
        (Self::OrganizationAuthenticationSettingsChanged, 5),
        (Self::OrganizationEnabled, 6),
        (Self::OrganizationDisabled, 7),
        (Self::OrganizationArchived, 8),
        (Self::OrganizationUnarchived, 9),
        (Self::OrganizationTrialConverted, 10),
        (Self::OrganizationUpdated, 11),
        (Self::ProjectCreated, 100),
        (Self::ProjectRenamed, 101),
        (Self::ProjectDescriptionChanged, 102),
        (Self::ProjectEnabled, 103),
        (Self::ProjectDisabled, 104),
        (Self::ProjectTrialConverted, 105),
        (Self::ProjectUpdated, 106),
        (Self::EnvironmentCreated, 200),
        (Self::EnvironmentRenamed, 201),
        (Self::EnvironmentDescriptionChanged, 202),
        (Self::EnvironmentRequireCommentChanged, 203),
        (Self::EnvironmentAutoArchiveChanged, 204),
        (Self::EnvironmentArchived, 205),
        (Self::EnvironmentUnarchived, 206),
        (Self::EnvironmentUpdated, 207),
    ];

    /// Wire code. Stable across releases.
    pub fn code(&self) -> i32 {
        Self::CODES
            .iter()
            .find(|(t, _)| t == self)
            .map(|(_, code)| *code)
            .unwrap_or(0)
    }

    /// Unrecognised codes decode to [`EventType::Unknown`].
    pub fn from_code(code: i32) -> Self {
        Self::CODES
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(t, _)| *t)
            .unwrap_or(Self::Unknown)
    }

    /// Audit-log operation label.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::OrganizationCreated | Self::ProjectCreated | Self::EnvironmentCreated => "CREATE",
            Self::OrganizationEnabled | Self::ProjectEnabled => "ENABLE",
            Self::OrganizationDisabled | Self::ProjectDisabled => "DISABLE",
            Self::OrganizationArchived | Self::EnvironmentArchived => "ARCHIVE",
            Self::OrganizationUnarchived | Self::EnvironmentUnarchived => "UNARCHIVE",
            Self::OrganizationTrialConverted | Self::ProjectTrialConverted => "CONVERT_TRIAL",
            Self::OrganizationRenamed
            | Self::OrganizationDescriptionChanged
            | Self::OrganizationOwnerEmailChanged
            | Self::OrganizationAuthenticationSettingsChanged
            | Self::OrganizationUpdated
            | Self::ProjectRenamed
            | Self::ProjectDescriptionChanged
            | Self::ProjectUpdated
            | Self::EnvironmentRenamed
            | Self::EnvironmentDescriptionChanged
            | Self::EnvironmentRequireCommentChanged
            | Self::EnvironmentAutoArchiveChanged
            | Self::EnvironmentUpdated => "UPDATE",
            Self::Unknown => "UNKNOWN_OPERATION",
        }
    }

    pub fn entity_type(&self) -> Option<EntityType> {
        match self.code() {
            1..=99 => Some(EntityType::Organization),
            100..=199 => Some(EntityType::Project),
            200..=299 => Some(EntityType::Environment),
            _ => None,
        }
    }
}

/// A typed event body. Implemented by the per-aggregate payload enums.
pub trait EventPayload: Serialize {
    fn event_type(&self) -> EventType;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrganizationEvent {
    Created {
        name: String,
        url_code: String,
        owner_email: String,
        trial: bool,
        system_admin: bool,
    },
    Renamed {
        name: String,
    },
    DescriptionChanged {
        description: String,
    },
    OwnerEmailChanged {
        owner_email: String,
    },
    AuthenticationSettingsChanged {
        enabled_types: Vec<AuthenticationType>,
    },
    Enabled,
    Disabled,
    Archived,
    Unarchived,
    TrialConverted,
    Updated {
        name: Option<String>,
        url_code: Option<String>,
        description: Option<String>,
        owner_email: Option<String>,
    },
}

impl EventPayload for OrganizationEvent {
    fn event_type(&self) -> EventType {
        match self {
            Self::Created { .. } => EventType::OrganizationCreated,
            Self::Renamed { .. } => EventType::OrganizationRenamed,
            Self::DescriptionChanged { .. } => EventType::OrganizationDescriptionChanged,
            Self::OwnerEmailChanged { .. } => EventType::OrganizationOwnerEmailChanged,
            Self::AuthenticationSettingsChanged { .. } => {
                EventType::OrganizationAuthenticationSettingsChanged
            }
            Self::Enabled => EventType::OrganizationEnabled,
            Self::Disabled => EventType::OrganizationDisabled,
            Self::Archived => EventType::OrganizationArchived,
            Self::Unarchived => EventType::OrganizationUnarchived,
            Self::TrialConverted => EventType::OrganizationTrialConverted,
            Self::Updated { .. } => EventType::OrganizationUpdated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProjectEvent {
    Created {
        name: String,
        url_code: String,
        creator_email: String,
        trial: bool,
    },
    Renamed {
        name: String,
    },
    DescriptionChanged {
        description: String,
    },
    Enabled,
    Disabled,
    TrialConverted,
    Updated {
        name: Option<String>,
        url_code: Option<String>,
        description: Option<String>,
    },
}

impl EventPayload for ProjectEvent {
    fn event_type(&self) -> EventType {
        match self {
            Self::Created { .. } => EventType::ProjectCreated,
            Self::Renamed { .. } => EventType::ProjectRenamed,
            Self::DescriptionChanged { .. } => EventType::ProjectDescriptionChanged,
            Self::Enabled => EventType::ProjectEnabled,
            Self::Disabled => EventType::ProjectDisabled,
            Self::TrialConverted => EventType::ProjectTrialConverted,
            Self::Updated { .. } => EventType::ProjectUpdated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnvironmentEvent {
    Created {
        name: String,
        url_code: String,
        project_id: Uuid,
        require_comment: bool,
    },
    Renamed {
        name: String,
    },
    DescriptionChanged {
        description: String,
    },
    RequireCommentChanged {
        require_comment: bool,
    },
    AutoArchiveChanged {
        auto_archive: AutoArchive,
    },
    Archived,
    Unarchived,
    Updated {
        name: Option<String>,
        url_code: Option<String>,
        description: Option<String>,
        require_comment: Option<bool>,
        auto_archive: Option<AutoArchive>,
    },
}

impl EventPayload for EnvironmentEvent {
    fn event_type(&self) -> EventType {
        match self {
            Self::Created { .. } => EventType::EnvironmentCreated,
            Self::Renamed { .. } => EventType::EnvironmentRenamed,
            Self::DescriptionChanged { .. } => EventType::EnvironmentDescriptionChanged,
            Self::RequireCommentChanged { .. } => EventType::EnvironmentRequireCommentChanged,
            Self::AutoArchiveChanged { .. } => EventType::EnvironmentAutoArchiveChanged,
            Self::Archived => EventType::EnvironmentArchived,
            Self::Unarchived => EventType::EnvironmentUnarchived,
            Self::Updated { .. } => EventType::EnvironmentUpdated,
        }
    }
}

/// Immutable record of a state change, delivered to the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub timestamp: i64,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub organization_id: Uuid,
    pub event_type: EventType,
    pub editor: Editor,
    /// Encoded [`EventPayload`].
    pub data: serde_json::Value,
    pub previous_entity_data: Option<serde_json::Value>,
    pub entity_data: Option<serde_json::Value>,
}

/// Identifies the aggregate an event is about.
#[derive(Debug, Clone, Copy)]
pub struct EventSubject {
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub organization_id: Uuid,
}

impl DomainEvent {
    pub fn new<P, S>(
        editor: &Editor,
        subject: EventSubject,
        payload: &P,
        previous: Option<&S>,
        current: Option<&S>,
    ) -> TenantryResult<Self>
    where
        P: EventPayload,
        S: Serialize,
    {
        Ok(Self {
            id: Uuid::new_v4(),
            timestamp: unix_now(),
            entity_type: subject.entity_type,
            entity_id: subject.entity_id.to_string(),
            organization_id: subject.organization_id,
            event_type: payload.event_type(),
            editor: editor.clone(),
            data: encode(payload)?,
            previous_entity_data: previous.map(encode).transpose()?,
            entity_data: current.map(encode).transpose()?,
        })
    }

    /// Decodes the payload back into its typed form.
    pub fn payload<P: serde::de::DeserializeOwned>(&self) -> TenantryResult<P> {
        serde_json::from_value(self.data.clone())
            .map_err(|e| TenantryError::Internal(format!("event decoding failed: {e}")))
    }
}

fn encode<T: Serialize>(value: &T) -> TenantryResult<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| TenantryError::Internal(format!("event encoding failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_codes_decode_to_the_unknown_sentinel() {
        assert_eq!(EventType::from_code(9999), EventType::Unknown);
        assert_eq!(EventType::from_code(-1), EventType::Unknown);
        assert_eq!(EventType::Unknown.operation(), "UNKNOWN_OPERATION");
        assert_eq!(EventType::Unknown.entity_type(), None);
    }

    #[test]
    fn codes_are_unique_and_round_trip() {
        let mut seen = std::collections::HashSet::new();
        for (event_type, code) in EventType::CODES {
            assert!(seen.insert(code), "duplicate code {code}");
            assert_eq!(EventType::from_code(code), event_type);
            assert_eq!(event_type.code(), code);
        }
    }

    #[test]
    fn event_types_group_by_entity() {
        assert_eq!(
            EventType::OrganizationDisabled.entity_type(),
            Some(EntityType::Organization)
        );
        assert_eq!(
            EventType::ProjectUpdated.entity_type(),
            Some(EntityType::Project)
        );
        assert_eq!(
            EventType::EnvironmentArchived.entity_type(),
            Some(EntityType::Environment)
        );
        assert_eq!(EventType::EnvironmentArchived.operation(), "ARCHIVE");
    }

    #[test]
    fn domain_event_encodes_payload_and_snapshots() {
        let id = Uuid::new_v4();
        let subject = EventSubject {
            entity_type: EntityType::Environment,
            entity_id: id,
            organization_id: Uuid::new_v4(),
        };
        let event = DomainEvent::new(
            &Editor::new("dev@acme.io"),
            subject,
            &EnvironmentEvent::Renamed { name: "prod".into() },
            Some(&serde_json::json!({"name": "old"})),
            Some(&serde_json::json!({"name": "prod"})),
        )
        .unwrap();

        assert_eq!(event.event_type, EventType::EnvironmentRenamed);
        assert_eq!(event.entity_id, id.to_string());
        assert_eq!(event.data["type"], "renamed");
        assert_eq!(
            event.payload::<EnvironmentEvent>().unwrap(),
            EnvironmentEvent::Renamed { name: "prod".into() }
        );
        assert_eq!(event.previous_entity_data.unwrap()["name"], "old");
    }
}
