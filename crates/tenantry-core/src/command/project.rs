use super::{Description, Empty, Name, decode_payload};
use crate::error::{TenantryResult, ValidationError};
use crate::event::{DomainEvent, Editor, EntityType, EventSubject, ProjectEvent};
use crate::models::project::{Project, UpdateProject};
use crate::publisher::EventSink;
use crate::validation::{EntityKind, validate_name};

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectCommand {
    Create,
    Rename { name: String },
    ChangeDescription { description: String },
    Enable,
    Disable,
    ConvertTrial,
    Update(UpdateProject),
}

impl ProjectCommand {
    pub const KINDS: [&'static str; 7] = [
        "create",
        "rename",
        "change_description",
        "enable",
        "disable",
        "convert_trial",
        "update",
    ];

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Rename { .. } => "rename",
            Self::ChangeDescription { .. } => "change_description",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::ConvertTrial => "convert_trial",
            Self::Update(_) => "update",
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Rename { name } => validate_name(EntityKind::Project, name).map(|_| ()),
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
            "update" => Self::Update(decode_payload(known, kind, payload)?),
            _ => {
                let Empty {} = decode_payload(known, kind, payload)?;
                match kind {
                    "create" => Self::Create,
                    "enable" => Self::Enable,
                    "disable" => Self::Disable,
                    _ => Self::ConvertTrial,
                }
            }
        })
    }
}

pub struct ProjectCommandHandler<'a> {
    editor: &'a Editor,
    project: &'a mut Project,
    sink: &'a dyn EventSink,
}

impl<'a> ProjectCommandHandler<'a> {
    pub fn new(editor: &'a Editor, project: &'a mut Project, sink: &'a dyn EventSink) -> Self {
        Self {
            editor,
            project,
            sink,
        }
    }

    pub fn handle(&mut self, command: ProjectCommand) -> TenantryResult<()> {
        let previous = self.project.clone();
        let project = &mut *self.project;
        let payload = match command {
            ProjectCommand::Create => ProjectEvent::Created {
                name: project.name.clone(),
                url_code: project.url_code.clone(),
                creator_email: project.creator_email.clone(),
                trial: project.trial,
            },
            ProjectCommand::Rename { name } => {
                project.rename(&name)?;
                ProjectEvent::Renamed {
                    name: project.name.clone(),
                }
            }
            ProjectCommand::ChangeDescription { description } => {
                project.change_description(description);
                ProjectEvent::DescriptionChanged {
                    description: project.description.clone(),
                }
            }
            ProjectCommand::Enable => {
                project.enable();
                ProjectEvent::Enabled
            }
            ProjectCommand::Disable => {
                project.disable();
                ProjectEvent::Disabled
            }
            ProjectCommand::ConvertTrial => {
                project.convert_trial();
                ProjectEvent::TrialConverted
            }
            ProjectCommand::Update(input) => {
                *project = project.update(&input)?;
                ProjectEvent::Updated {
                    name: input.name.as_ref().map(|_| project.name.clone()),
                    url_code: input.url_code,
                    description: input.description,
                }
            }
        };

        let previous = match payload {
            ProjectEvent::Created { .. } => None,
            _ => Some(&previous),
        };
        let event = DomainEvent::new(
            self.editor,
            EventSubject {
                entity_type: EntityType::Project,
                entity_id: self.project.id,
                organization_id: self.project.organization_id,
            },
            &payload,
            previous,
            Some(&*self.project),
        )?;
        self.sink.publish(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use crate::models::project::CreateProject;
    use crate::publisher::EventBuffer;
    use uuid::Uuid;

    fn project() -> Project {
        Project::new(CreateProject {
            organization_id: Uuid::new_v4(),
            name: "Checkout".into(),
            url_code: "checkout".into(),
            description: String::new(),
            creator_email: "dev@acme.io".into(),
            trial: false,
        })
        .unwrap()
    }

    #[test]
    fn rename_records_trimmed_name() {
        let editor = Editor::new("dev@acme.io");
        let buffer = EventBuffer::new();
        let mut p = project();

        ProjectCommandHandler::new(&editor, &mut p, &buffer)
            .handle(ProjectCommand::Rename {
                name: "  Payments ".into(),
            })
            .unwrap();

        assert_eq!(p.name, "Payments");
        let event = buffer.drain().remove(0);
        assert_eq!(event.event_type, EventType::ProjectRenamed);
        assert_eq!(event.organization_id, p.organization_id);
        assert_eq!(event.previous_entity_data.unwrap()["name"], "Checkout");
        assert_eq!(event.entity_data.unwrap()["name"], "Payments");
    }

    #[test]
    fn update_event_carries_only_supplied_fields() {
        let editor = Editor::new("dev@acme.io");
        let buffer = EventBuffer::new();
        let mut p = project();

        ProjectCommandHandler::new(&editor, &mut p, &buffer)
            .handle(ProjectCommand::Update(UpdateProject {
                description: Some("billing".into()),
                ..Default::default()
            }))
            .unwrap();

        let payload: ProjectEvent = buffer.drain()[0].payload().unwrap();
        assert_eq!(
            payload,
            ProjectEvent::Updated {
                name: None,
                url_code: None,
                description: Some("billing".into()),
            }
        );
    }

    #[test]
    fn every_kind_round_trips_through_decode() {
        for kind in ProjectCommand::KINDS {
            let payload = serde_json::json!({"name": "n", "description": "d"});
            assert_eq!(ProjectCommand::decode(kind, payload).unwrap().kind(), kind);
        }
    }
}
