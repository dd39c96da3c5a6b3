use tenantry_core::error::TenantryResult;
use tenantry_core::publisher::{EventBuffer, EventPublisher};
use tracing::{debug, warn};

/// Hands everything collected in `buffer` to `publisher`.
///
/// Called only after the batch has committed, so a rolled-back write never
/// reaches the audit log. A delivery failure leaves the write in place and
/// is reported as `Publish`.
pub(crate) async fn deliver<P: EventPublisher>(
    publisher: &P,
    buffer: &EventBuffer,
) -> TenantryResult<()> {
    let events = buffer.drain();
    if events.is_empty() {
        return Ok(());
    }
    let count = events.len();
    publisher.publish(events).await.map_err(|err| {
        warn!(error = %err, count, "Event delivery failed");
        err
    })?;
    debug!(count, "Events delivered");
    Ok(())
}
