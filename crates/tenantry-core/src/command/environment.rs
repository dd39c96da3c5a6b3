use serde::Deserialize;

use super::{Description, Empty, Name, decode_payload};
use crate::error::{TenantryResult, ValidationError};
use crate::event::{DomainEvent, Editor, EntityType, EnvironmentEvent, EventSubject};
use crate::models::environment::{AutoArchive, Environment, UpdateEnvironment};
use crate::publisher::EventSink;
use crate::validation::{EntityKind, validate_auto_archive, validate_name};

#[derive(Debug, Clone, PartialEq)]
pub enum EnvironmentCommand {
    Create,
    Rename { name: String },
    ChangeDescription { description: String },
    ChangeRequireComment { require_comment: bool },
    ChangeAutoArchive { auto_archive: AutoArchive },
    Archive,
    Unarchive,
    Update(UpdateEnvironment),
}

#[derive(Deserialize)]
struct RequireComment {
    require_comment: bool,
}

impl EnvironmentCommand {
    pub const KINDS: [&'static str; 8] = [
        "create",
        "rename",
        "change_description",
        "change_require_comment",
        "change_auto_archive",
        "archive",
        "unarchive",
        "update",
    ];

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Rename { .. } => "rename",
            Self::ChangeDescription { .. } => "change_description",
            Self::ChangeRequireComment { .. } => "change_require_comment",
            Self::ChangeAutoArchive { .. } => "change_auto_archive",
            Self::Archive => "archive",
            Self::Unarchive => "unarchive",
            Self::Update(_) => "update",
        }
    }

    /// Checks payload fields; existence and state are checked by the handler.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Rename { name } => validate_name(EntityKind::Environment, name).map(|_| ()),
            Self::ChangeAutoArchive { auto_archive } => validate_auto_archive(auto_archive),
            Self::Update(input) => input.validate(),
            _ => Ok(()),
        }
    }

    /// Decodes a transport payload. Unknown kinds fail with `UnknownCommand`.
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
            "change_require_comment" => {
                let RequireComment { require_comment } = decode_payload(known, kind, payload)?;
                Self::ChangeRequireComment { require_comment }
            }
            "change_auto_archive" => Self::ChangeAutoArchive {
                auto_archive: decode_payload(known, kind, payload)?,
            },
            "update" => Self::Update(decode_payload(known, kind, payload)?),
            _ => {
                let Empty {} = decode_payload(known, kind, payload)?;
                match kind {
                    "create" => Self::Create,
                    "archive" => Self::Archive,
                    _ => Self::Unarchive,
                }
            }
        })
    }
}

pub struct EnvironmentCommandHandler<'a> {
    editor: &'a Editor,
    environment: &'a mut Environment,
    sink: &'a dyn EventSink,
}

impl<'a> EnvironmentCommandHandler<'a> {
    pub fn new(
        editor: &'a Editor,
        environment: &'a mut Environment,
        sink: &'a dyn EventSink,
    ) -> Self {
        Self {
            editor,
            environment,
            sink,
        }
    }

    pub fn handle(&mut self, command: EnvironmentCommand) -> TenantryResult<()> {
        let previous = self.environment.clone();
        let env = &mut *self.environment;
        let payload = match command {
            EnvironmentCommand::Create => EnvironmentEvent::Created {
                name: env.name.clone(),
                url_code: env.url_code.clone(),
                project_id: env.project_id,
                require_comment: env.require_comment,
            },
            EnvironmentCommand::Rename { name } => {
                env.rename(&name)?;
                EnvironmentEvent::Renamed {
                    name: env.name.clone(),
                }
            }
            EnvironmentCommand::ChangeDescription { description } => {
                env.change_description(description);
                EnvironmentEvent::DescriptionChanged {
                    description: env.description.clone(),
                }
            }
            EnvironmentCommand::ChangeRequireComment { require_comment } => {
                env.change_require_comment(require_comment);
                EnvironmentEvent::RequireCommentChanged { require_comment }
            }
            EnvironmentCommand::ChangeAutoArchive { auto_archive } => {
                env.change_auto_archive(auto_archive)?;
                EnvironmentEvent::AutoArchiveChanged { auto_archive }
            }
            EnvironmentCommand::Archive => {
                env.archive();
                EnvironmentEvent::Archived
            }
            EnvironmentCommand::Unarchive => {
                env.unarchive();
                EnvironmentEvent::Unarchived
            }
            EnvironmentCommand::Update(input) => {
                *env = env.update(&input)?;
                EnvironmentEvent::Updated {
                    name: input.name.as_ref().map(|_| env.name.clone()),
                    url_code: input.url_code,
                    description: input.description,
                    require_comment: input.require_comment,
                    auto_archive: input.auto_archive,
                }
            }
        };

        let previous = match payload {
            EnvironmentEvent::Created { .. } => None,
            _ => Some(&previous),
        };
        let event = DomainEvent::new(
            self.editor,
            EventSubject {
                entity_type: EntityType::Environment,
                entity_id: self.environment.id,
                organization_id: self.environment.organization_id,
            },
            &payload,
            previous,
            Some(&*self.environment),
        )?;
        self.sink.publish(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TenantryError;
    use crate::event::EventType;
    use crate::models::environment::CreateEnvironment;
    use crate::publisher::EventBuffer;
    use uuid::Uuid;

    fn environment() -> Environment {
        Environment::new(
            CreateEnvironment {
                project_id: Uuid::new_v4(),
                name: "Staging".into(),
                url_code: "staging".into(),
                description: String::new(),
                require_comment: false,
                auto_archive: AutoArchive::default(),
            },
            Uuid::new_v4(),
        )
        .unwrap()
    }

    #[test]
    fn archive_publishes_event_with_before_and_after() {
        let editor = Editor::new("dev@acme.io");
        let buffer = EventBuffer::new();
        let mut env = environment();

        EnvironmentCommandHandler::new(&editor, &mut env, &buffer)
            .handle(EnvironmentCommand::Archive)
            .unwrap();

        assert!(env.archived);
        let events = buffer.drain();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.event_type, EventType::EnvironmentArchived);
        assert_eq!(event.entity_id, env.id.to_string());
        assert_eq!(event.editor, editor);
        assert_eq!(event.previous_entity_data.as_ref().unwrap()["archived"], false);
        assert_eq!(event.entity_data.as_ref().unwrap()["archived"], true);
    }

    #[test]
    fn create_has_no_previous_snapshot() {
        let editor = Editor::new("dev@acme.io");
        let buffer = EventBuffer::new();
        let mut env = environment();

        EnvironmentCommandHandler::new(&editor, &mut env, &buffer)
            .handle(EnvironmentCommand::Create)
            .unwrap();

        let event = buffer.drain().remove(0);
        assert_eq!(event.event_type, EventType::EnvironmentCreated);
        assert!(event.previous_entity_data.is_none());
    }

    #[test]
    fn failed_update_neither_mutates_nor_publishes() {
        let editor = Editor::new("dev@acme.io");
        let buffer = EventBuffer::new();
        let mut env = environment();
        let before = env.clone();

        let err = EnvironmentCommandHandler::new(&editor, &mut env, &buffer)
            .handle(EnvironmentCommand::Update(UpdateEnvironment {
                url_code: Some("URLCODE".into()),
                ..Default::default()
            }))
            .unwrap_err();

        assert!(matches!(
            err,
            TenantryError::InvalidArgument(ValidationError::InvalidEnvironmentUrlCode)
        ));
        assert_eq!(env, before);
        assert!(buffer.is_empty());
    }

    #[test]
    fn decode_known_and_unknown_kinds() {
        assert_eq!(
            EnvironmentCommand::decode("rename", serde_json::json!({"name": "prod"})).unwrap(),
            EnvironmentCommand::Rename {
                name: "prod".into()
            }
        );
        assert_eq!(
            EnvironmentCommand::decode("archive", serde_json::json!({})).unwrap(),
            EnvironmentCommand::Archive
        );
        assert!(matches!(
            EnvironmentCommand::decode("delete", serde_json::json!({})),
            Err(TenantryError::UnknownCommand(kind)) if kind == "delete"
        ));
        assert!(matches!(
            EnvironmentCommand::decode("rename", serde_json::json!({"title": 1})),
            Err(TenantryError::InvalidArgument(ValidationError::MalformedCommand { .. }))
        ));
    }

    #[test]
    fn every_kind_decodes_to_a_command_with_that_kind() {
        let payload = serde_json::json!({
            "name": "n",
            "description": "d",
            "require_comment": true,
            "enabled": false,
            "unused_days": 0,
            "check_code_refs": false,
        });
        for kind in EnvironmentCommand::KINDS {
            let command = EnvironmentCommand::decode(kind, payload.clone()).unwrap();
            assert_eq!(command.kind(), kind);
        }
    }

    #[test]
    fn validate_checks_payload_fields_only() {
        assert_eq!(
            EnvironmentCommand::Rename { name: "   ".into() }.validate(),
            Err(ValidationError::EnvironmentNameRequired)
        );
        assert_eq!(
            EnvironmentCommand::ChangeAutoArchive {
                auto_archive: AutoArchive {
                    enabled: true,
                    unused_days: 0,
                    check_code_refs: false,
                },
            }
            .validate(),
            Err(ValidationError::InvalidAutoArchiveUnusedDays)
        );
        assert_eq!(
            EnvironmentCommand::Update(UpdateEnvironment::default()).validate(),
            Err(ValidationError::NothingToUpdate)
        );
        assert_eq!(EnvironmentCommand::Archive.validate(), Ok(()));
    }
}
