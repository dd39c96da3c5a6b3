//! Event delivery seams.
//!
//! Handlers publish into an [`EventSink`] scoped to the running
//! transaction. Services then hand the collected events to an
//! [`EventPublisher`], the external audit-log collaborator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::info;

use crate::error::{TenantryError, TenantryResult};
use crate::event::DomainEvent;

/// Synchronous, transaction-scoped event sink used by command handlers.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: DomainEvent) -> TenantryResult<()>;
}

/// Collects events for the duration of one transaction.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: Mutex<Vec<DomainEvent>>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes every buffered event, leaving the buffer empty.
    pub fn drain(&self) -> Vec<DomainEvent> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *events)
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for EventBuffer {
    fn publish(&self, event: DomainEvent) -> TenantryResult<()> {
        self.events
            .lock()
            .map_err(|_| TenantryError::Internal("event buffer poisoned".into()))?
            .push(event);
        Ok(())
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct PublishError(pub String);

impl From<PublishError> for TenantryError {
    fn from(err: PublishError) -> Self {
        TenantryError::Publish(err.0)
    }
}

/// Asynchronous delivery of domain events to the audit log.
pub trait EventPublisher: Send + Sync {
    fn publish(
        &self,
        events: Vec<DomainEvent>,
    ) -> impl Future<Output = Result<(), PublishError>> + Send;
}

/// Writes each event to the log. Used by the operator binary.
#[derive(Debug, Clone, Default)]
pub struct LogPublisher;

impl EventPublisher for LogPublisher {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), PublishError> {
        for event in &events {
            info!(
                event_id = %event.id,
                event_type = ?event.event_type,
                operation = event.event_type.operation(),
                entity_id = %event.entity_id,
                organization_id = %event.organization_id,
                editor = %event.editor.email,
                "Domain event"
            );
        }
        Ok(())
    }
}

/// Keeps delivered events in memory; can be switched into a failing mode.
#[derive(Debug, Clone, Default)]
pub struct MemoryPublisher {
    events: Arc<Mutex<Vec<DomainEvent>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventPublisher for MemoryPublisher {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError("publisher unavailable".into()));
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(events);
        Ok(())
    }
}
