//! Bulk reconciliation.
//!
//! Change events are delivered once, in-process, with no retry. A failed
//! replication or a crash between a mutation and its notification leaves
//! stores apart until a reconciliation pass replays the reference store's
//! records through the ordinary propagation path.

use crate::error::{SyncError, SyncResult};
use crate::event::ChangeEvent;
use crate::report::{ReconcileFailure, ReconcileReport};
use crate::synchronizer::Synchronizer;
use crossync_record::{FieldChanges, LocalId};
use tracing::{debug, info, warn};

impl Synchronizer {
    /// Replays every record of `type_name` held by `reference` into the
    /// other attached stores.
    ///
    /// Identities are read in batches of the configured
    /// `reconcile_batch_size`. Each record is replayed as an update
    /// carrying all of its fields, so missing replicas are created and
    /// stale ones overwritten. Records deleted since enumeration are
    /// skipped; records whose key is being propagated concurrently are
    /// counted as suppressed.
    ///
    /// Reconciliation never deletes: a replica with no counterpart in the
    /// reference store is left alone.
    ///
    /// # Errors
    ///
    /// - `UnknownStore` if `reference` is not attached
    /// - `Store` if the reference store cannot enumerate its identities
    pub fn reconcile(&self, reference: &str, type_name: &str) -> SyncResult<ReconcileReport> {
        self.reconcile_matching(reference, type_name, &FieldChanges::new())
    }

    /// Like [`reconcile`](Self::reconcile), but replays only records whose
    /// fields resolve to the values in `filter`. Records that do not match
    /// are counted in `filtered` and left alone.
    ///
    /// # Errors
    ///
    /// Same as [`reconcile`](Self::reconcile).
    pub fn reconcile_matching(
        &self,
        reference: &str,
        type_name: &str,
        filter: &FieldChanges,
    ) -> SyncResult<ReconcileReport> {
        let source = self
            .store(reference)
            .ok_or_else(|| SyncError::UnknownStore(reference.to_owned()))?;

        let mut identities = source.enumerate_identities(type_name)?;
        let batch_size = self.config().batch_size();
        let mut report = ReconcileReport::new(reference, type_name);

        loop {
            let batch: Vec<LocalId> = identities.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                break;
            }
            report.batches += 1;

            for id in batch {
                report.scanned += 1;
                let record = match source.get(&id) {
                    Ok(record) => record,
                    Err(err) if err.is_not_found() => continue,
                    Err(err) => {
                        warn!(store = reference, id = %id, error = %err, "reconciliation read failed");
                        report.failures.push(ReconcileFailure {
                            key: None,
                            error: err,
                        });
                        continue;
                    }
                };

                if !record.matches(filter) {
                    report.filtered += 1;
                    continue;
                }

                let event = ChangeEvent::replay(reference, record, id);
                match self.propagate(&event) {
                    Ok(chain) => report.absorb(chain),
                    Err(SyncError::LoopSuppressed { .. }) => report.suppressed += 1,
                    Err(err) => return Err(err),
                }
            }

            debug!(
                synchronizer = self.id(),
                reference,
                batch = report.batches,
                scanned = report.scanned,
                "reconciliation batch done"
            );
        }

        info!(
            synchronizer = self.id(),
            reference,
            type_name,
            scanned = report.scanned,
            created = report.created,
            updated = report.updated,
            filtered = report.filtered,
            failures = report.failures.len(),
            "reconciliation finished"
        );
        Ok(report)
    }

    /// Reconciles `type_name` using every attached store as the reference
    /// in turn, in attachment order.
    ///
    /// Afterwards every store holds the union of the keys present anywhere
    /// before the pass, with values from the last reference holding each
    /// key.
    pub fn reconcile_all(&self, type_name: &str) -> SyncResult<Vec<ReconcileReport>> {
        self.reconcile_all_matching(type_name, &FieldChanges::new())
    }

    /// Filtered form of [`reconcile_all`](Self::reconcile_all).
    pub fn reconcile_all_matching(
        &self,
        type_name: &str,
        filter: &FieldChanges,
    ) -> SyncResult<Vec<ReconcileReport>> {
        self.stores()
            .iter()
            .map(|store| self.reconcile_matching(store.id(), type_name, filter))
            .collect()
    }
}
