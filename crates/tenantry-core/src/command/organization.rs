use serde::Deserialize;

use super::{Description, Empty, Name, decode_payload};
use crate::error::{TenantryResult, ValidationError};
use crate::event::{DomainEvent, Editor, EntityType, EventSubject, OrganizationEvent};
use crate::models::organization::{AuthenticationSettings, Organization, UpdateOrganization};
use crate::publisher::EventSink;
use crate::validation::{EntityKind, validate_email, validate_name};

#[derive(Debug, Clone, PartialEq)]
pub enum OrganizationCommand {
    Create,
    Rename { name: String },
    ChangeDescription { description: String },
    ChangeOwnerEmail { owner_email: String },
    ChangeAuthenticationSettings { settings: AuthenticationSettings },
    Enable,
    Disable,
    Archive,
    Unarchive,
    ConvertTrial,
    Update(UpdateOrganization),
}

#[derive(Deserialize)]
struct OwnerEmail {
    owner_email: String,
}

impl OrganizationCommand {
    pub const KINDS: [&'static str; 11] = [
        "create",
        "rename",
        "change_description",
        "change_owner_email",
        "change_authentication_settings",
        "enable",
        "disable",
        "archive",
        "unarchive",
        "convert_trial",
        "update",
    ];

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Rename { .. } => "rename",
            Self::ChangeDescription { .. } => "change_description",
            Self::ChangeOwnerEmail { .. } => "change_owner_email",
            Self::ChangeAuthenticationSettings { .. } => "change_authentication_settings",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Archive => "archive",
            Self::Unarchive => "unarchive",
            Self::ConvertTrial => "convert_trial",
            Self::Update(_) => "update",
        }
    }

    /// Checks the command's own fields; no aggregate is needed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Rename { name } => validate_name(EntityKind::Organization, name).map(|_| ()),
            Self::ChangeOwnerEmail { owner_email } => validate_email(owner_email),
            Self::Update(input) => input.validate(),
            _ => Ok(()),
        }
    }

    pub fn decode(kind: &str, payload: serde_json::Value) -> TenantryResult<Self> {
        let known = &Self::KINDS;
        Ok(match kind {
            "rename" => {
                let Name { name } = decode_payload(known, kind, payload)?;
                Self::Rename { name }
            }
            "change_description" => {
                let Description { description } = decode_payload(known, kind, payload)?;
                Self::ChangeDescription { description }
            }
            "change_owner_email" => {
                let OwnerEmail { owner_email } = decode_payload(known, kind, payload)?;
                Self::ChangeOwnerEmail { owner_email }
            }
            "change_authentication_settings" => Self::ChangeAuthenticationSettings {
                settings: decode_payload(known, kind, payload)?,
            },
            "update" => Self::Update(decode_payload(known, kind, payload)?),
            _ => {
                let Empty {} = decode_payload(known, kind, payload)?;
                match kind {
                    "create" => Self::Create,
                    "enable" => Self::Enable,
                    "disable" => Self::Disable,
                    "archive" => Self::Archive,
                    "unarchive" => Self::Unarchive,
                    _ => Self::ConvertTrial,
                }
            }
        })
    }
}

pub struct OrganizationCommandHandler<'a> {
    editor: &'a Editor,
    organization: &'a mut Organization,
    sink: &'a dyn EventSink,
}

impl<'a> OrganizationCommandHandler<'a> {
    pub fn new(
        editor: &'a Editor,
        organization: &'a mut Organization,
        sink: &'a dyn EventSink,
    ) -> Self {
        Self {
            editor,
            organization,
            sink,
        }
    }

    /// Applies `command`. On error the organization is left as it was and
    /// nothing is published.
    pub fn handle(&mut self, command: OrganizationCommand) -> TenantryResult<()> {
        let previous = self.organization.clone();
        let org = &mut *self.organization;
        let payload = match command {
            OrganizationCommand::Create => OrganizationEvent::Created {
                name: org.name.clone(),
                url_code: org.url_code.clone(),
                owner_email: org.owner_email.clone(),
                trial: org.trial,
                system_admin: org.system_admin,
            },
            OrganizationCommand::Rename { name } => {
                org.rename(&name)?;
                OrganizationEvent::Renamed {
                    name: org.name.clone(),
                }
            }
            OrganizationCommand::ChangeDescription { description } => {
                org.change_description(description);
                OrganizationEvent::DescriptionChanged {
                    description: org.description.clone(),
                }
            }
            OrganizationCommand::ChangeOwnerEmail { owner_email } => {
                org.change_owner_email(&owner_email)?;
                OrganizationEvent::OwnerEmailChanged { owner_email }
            }
            OrganizationCommand::ChangeAuthenticationSettings { settings } => {
                org.change_authentication_settings(settings);
                OrganizationEvent::AuthenticationSettingsChanged {
                    enabled_types: org.authentication_settings.enabled_types().collect(),
                }
            }
            OrganizationCommand::Enable => {
                org.enable();
                OrganizationEvent::Enabled
            }
            OrganizationCommand::Disable => {
                org.disable()?;
                OrganizationEvent::Disabled
            }
            OrganizationCommand::Archive => {
                org.archive()?;
                OrganizationEvent::Archived
            }
            OrganizationCommand::Unarchive => {
                org.unarchive();
                OrganizationEvent::Unarchived
            }
            OrganizationCommand::ConvertTrial => {
                org.convert_trial();
                OrganizationEvent::TrialConverted
            }
            OrganizationCommand::Update(input) => {
                *org = org.update(&input)?;
                OrganizationEvent::Updated {
                    name: input.name.as_ref().map(|_| org.name.clone()),
                    url_code: input.url_code,
                    description: input.description,
                    owner_email: input.owner_email,
                }
            }
        };

        let previous = match payload {
            OrganizationEvent::Created { .. } => None,
            _ => Some(&previous),
        };
        let event = DomainEvent::new(
            self.editor,
            EventSubject {
                entity_type: EntityType::Organization,
                entity_id: self.organization.id,
                organization_id: self.organization.id,
            },
            &payload,
            previous,
            Some(&*self.organization),
        )?;
        self.sink.publish(event)
    }
}
