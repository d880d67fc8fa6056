use uuid::Uuid;
use super::event::EventEnvelope;

// ============================================================================
// Aggregate Root Pattern
// ============================================================================
//
// 1. State is derived from events (not stored directly)
// 2. Commands are validated before events are emitted
// 3. Events are facts that have already happened
// 4. Aggregates enforce their own invariants
//
// ============================================================================

/// Event-sourced aggregate
///
/// Type Parameters:
/// - `Event`: domain event type for this aggregate
/// - `Command`: command type for this aggregate
/// - `Error`: business rule violation type
pub trait Aggregate: Sized + Send + Sync {
    type Event;
    type Command;
    type Error;

    /// Create the aggregate from its first event
    fn apply_first_event(aggregate_id: Uuid, event: &Self::Event) -> Result<Self, Self::Error>;

    /// Apply a subsequent event
    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error>;

    /// Decide which events a command produces (no mutation)
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    fn aggregate_id(&self) -> Uuid;

    /// Sequence number of the last applied event
    fn version(&self) -> i64;

    fn set_version(&mut self, version: i64);

    /// Rebuild from history. An empty history yields `None`.
    fn load_from_events(
        aggregate_id: Uuid,
        events: Vec<EventEnvelope<Self::Event>>,
    ) -> Result<Option<Self>, Self::Error> {
        let mut events = events.into_iter();

        let Some(first) = events.next() else {
            return Ok(None);
        };

        let mut aggregate = Self::apply_first_event(aggregate_id, &first.event_data)?;
        aggregate.set_version(first.sequence_number);

        for envelope in events {
            aggregate.apply_event(&envelope.event_data)?;
            aggregate.set_version(envelope.sequence_number);
        }

        Ok(Some(aggregate))
    }
}
