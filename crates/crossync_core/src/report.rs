//! Outcomes of propagation chains and reconciliation passes.

use crate::error::StoreError;
use crate::event::Operation;
use crate::store::SubscriberNotice;
use crossync_record::{IdentityKey, LocalId};
use std::fmt;
use uuid::Uuid;

/// Correlates the log lines and report of one propagation chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(Uuid);

impl ChainId {
    /// Generates a fresh chain id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ChainId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a synchronizer did in one target store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationAction {
    /// The record was created under this identity.
    Created(LocalId),
    /// The record under this identity was updated.
    Updated(LocalId),
    /// The record under this identity was deleted.
    Deleted(LocalId),
    /// A create found the key already present; nothing was written.
    AlreadyPresent(LocalId),
    /// A delete found nothing to remove.
    Absent,
}

impl ReplicationAction {
    /// Returns the local identity in the target store, if any.
    pub fn local_id(&self) -> Option<&LocalId> {
        match self {
            Self::Created(id) | Self::Updated(id) | Self::Deleted(id) | Self::AlreadyPresent(id) => {
                Some(id)
            }
            Self::Absent => None,
        }
    }

    /// Returns true if the target store was written.
    pub fn wrote(&self) -> bool {
        matches!(self, Self::Created(_) | Self::Updated(_) | Self::Deleted(_))
    }
}

/// Outcome of one propagation chain in one target store.
#[derive(Debug)]
pub struct TargetOutcome {
    /// Target store id.
    pub store: String,
    /// What happened, or why it failed.
    pub result: Result<ReplicationAction, StoreError>,
    /// Notices from the target's own subscribers, if the target was
    /// written.
    pub downstream: Vec<SubscriberNotice>,
}

impl TargetOutcome {
    /// Returns true if replication into this store succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcome of one propagation chain.
///
/// Holds one [`TargetOutcome`] per store other than the source, in
/// attachment order. A failure in one target never prevents the others
/// from being attempted.
#[derive(Debug)]
pub struct PropagationReport {
    /// Chain id, also recorded on the chain's tracing span.
    pub chain: ChainId,
    /// Identity key being propagated.
    pub key: IdentityKey,
    /// Store that emitted the triggering event.
    pub source: String,
    /// Operation being propagated.
    pub operation: Operation,
    /// Per-target outcomes.
    pub outcomes: Vec<TargetOutcome>,
}

impl PropagationReport {
    /// Iterates the failed targets with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &StoreError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.store.as_str(), e)))
    }

    /// Returns the number of failed targets.
    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// Returns true if every target succeeded.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(TargetOutcome::is_success)
    }

    /// Returns the outcome for `store`.
    pub fn outcome(&self, store: &str) -> Option<&TargetOutcome> {
        self.outcomes.iter().find(|o| o.store == store)
    }

    /// Returns the action taken in `store`, if replication succeeded.
    pub fn action(&self, store: &str) -> Option<&ReplicationAction> {
        self.outcome(store).and_then(|o| o.result.as_ref().ok())
    }
}

/// A failure collected during reconciliation.
#[derive(Debug)]
pub struct ReconcileFailure {
    /// Key being replayed, or `None` if reading the reference failed.
    pub key: Option<IdentityKey>,
    /// The error.
    pub error: StoreError,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Reference store id.
    pub reference: String,
    /// Record type that was reconciled.
    pub type_name: String,
    /// Identities read from the reference store.
    pub scanned: usize,
    /// Batches processed.
    pub batches: usize,
    /// Records created in other stores.
    pub created: usize,
    /// Records updated in other stores.
    pub updated: usize,
    /// Identities skipped because their key was already in flight.
    pub suppressed: usize,
    /// Records skipped because they did not match the filter.
    pub filtered: usize,
    /// Failed reads and replications.
    pub failures: Vec<ReconcileFailure>,
}

impl ReconcileReport {
    pub(crate) fn new(reference: &str, type_name: &str) -> Self {
        Self {
            reference: reference.to_owned(),
            type_name: type_name.to_owned(),
            ..Self::default()
        }
    }

    /// Folds one replay chain into the totals.
    pub(crate) fn absorb(&mut self, report: PropagationReport) {
        for outcome in report.outcomes {
            match outcome.result {
                Ok(ReplicationAction::Created(_)) => self.created += 1,
                Ok(ReplicationAction::Updated(_)) => self.updated += 1,
                Ok(_) => {}
                Err(error) => self.failures.push(ReconcileFailure {
                    key: Some(report.key.clone()),
                    error,
                }),
            }
        }
    }

    /// Returns true if nothing failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> IdentityKey {
        IdentityKey::new("host1", "dc1", "Server").unwrap()
    }

    fn report(outcomes: Vec<TargetOutcome>) -> PropagationReport {
        PropagationReport {
            chain: ChainId::new(),
            key: key(),
            source: "a".to_owned(),
            operation: Operation::Create,
            outcomes,
        }
    }

    fn ok(store: &str, action: ReplicationAction) -> TargetOutcome {
        TargetOutcome {
            store: store.to_owned(),
            result: Ok(action),
            downstream: Vec::new(),
        }
    }

    fn failed(store: &str) -> TargetOutcome {
        TargetOutcome {
            store: store.to_owned(),
            result: Err(StoreError::Conflict {
                store: store.to_owned(),
                key: key(),
            }),
            downstream: Vec::new(),
        }
    }

    #[test]
    fn chain_ids_are_unique() {
        assert_ne!(ChainId::new(), ChainId::new());
        let id = ChainId::new();
        assert_eq!(id.to_string(), id.as_uuid().to_string());
    }

    #[test]
    fn report_counts_failures() {
        let report = report(vec![
            ok("b", ReplicationAction::Created(LocalId::new("1"))),
            failed("c"),
            ok("d", ReplicationAction::AlreadyPresent(LocalId::new("4"))),
        ]);

        assert!(!report.is_complete());
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.failures().next().unwrap().0, "c");
        assert_eq!(
            report.action("b"),
            Some(&ReplicationAction::Created(LocalId::new("1")))
        );
        assert!(report.action("c").is_none());
        assert!(report.outcome("z").is_none());
    }

    #[test]
    fn empty_report_is_complete() {
        assert!(report(Vec::new()).is_complete());
    }

    #[test]
    fn action_accessors() {
        assert!(ReplicationAction::Updated(LocalId::new("2")).wrote());
        assert!(!ReplicationAction::AlreadyPresent(LocalId::new("2")).wrote());
        assert!(ReplicationAction::Absent.local_id().is_none());
    }

    #[test]
    fn reconcile_report_absorbs_chains() {
        let mut totals = ReconcileReport::new("a", "Server");
        totals.absorb(report(vec![
            ok("b", ReplicationAction::Created(LocalId::new("1"))),
            ok("c", ReplicationAction::Updated(LocalId::new("9"))),
        ]));
        totals.absorb(report(vec![failed("b"), ok("c", ReplicationAction::Absent)]));

        assert_eq!(totals.created, 1);
        assert_eq!(totals.updated, 1);
        assert_eq!(totals.failures.len(), 1);
        assert_eq!(totals.failures[0].error.store(), "b");
        assert!(!totals.is_clean());
    }
}
