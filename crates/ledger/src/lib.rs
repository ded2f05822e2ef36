//! Event-sourced commission ledger. Commissions are never updated in place:
//! every state change is an appended event, and duplicate webhook deliveries
//! are absorbed by the idempotency key (the payment processor's event id).

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use clinic_core::error::{ClinicError, ClinicResult};
use clinic_core::types::{AffiliateId, ClinicId, PatientId};

/// What happened to a commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionEventKind {
    Created,
    Approved,
    Paid,
    Reversed,
}

/// Folded state of a commission's event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Pending,
    Approved,
    Paid,
    Reversed,
}

/// One appended ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionEvent {
    pub id: Uuid,
    pub commission_id: Uuid,
    /// Payment-processor event id. One ledger append per key, ever.
    pub idempotency_key: String,
    pub clinic_id: ClinicId,
    pub affiliate_id: AffiliateId,
    pub patient_id: PatientId,
    pub kind: CommissionEventKind,
    /// Underlying payment amount the commission derives from.
    pub revenue_cents: u64,
    pub commission_cents: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct CommissionLedger {
    events: RwLock<Vec<CommissionEvent>>,
    seen_keys: DashMap<String, Uuid>,
}

impl CommissionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. Returns `Ok(false)` without appending when the
    /// idempotency key was already recorded — the duplicate-delivery path.
    /// Illegal transitions (e.g. paying a reversed commission) are errors.
    pub fn record(&self, event: CommissionEvent) -> ClinicResult<bool> {
        if let Some(existing) = self.seen_keys.get(&event.idempotency_key) {
            debug!(idempotency_key = %event.idempotency_key, event_id = %existing.value(),
                   "Duplicate commission event ignored");
            metrics::counter!("ledger.duplicate_events").increment(1);
            return Ok(false);
        }

        // Lock order: events log first, then the key index. The log write
        // and the key registration must be observed together by `record`
        // callers, so the key insert happens while the log lock is held.
        // The transition check also runs under the lock: two concurrent
        // appends for one commission must not both validate against the
        // same stale status.
        let mut events = self.events.write();
        let current = fold_status(&events, event.commission_id);
        validate_transition(current, event.kind)?;
        if self
            .seen_keys
            .insert(event.idempotency_key.clone(), event.id)
            .is_some()
        {
            // A racing append with the same key beat us between the
            // unlocked check and the log lock.
            return Ok(false);
        }
        info!(commission_id = %event.commission_id, kind = ?event.kind,
              affiliate_id = %event.affiliate_id, commission_cents = event.commission_cents,
              "Commission event appended");
        metrics::counter!("ledger.events_appended").increment(1);
        events.push(event);
        Ok(true)
    }

    /// Fold a commission's events into its current status. `None` when no
    /// events exist for the id.
    pub fn status_of(&self, commission_id: Uuid) -> Option<CommissionStatus> {
        fold_status(&self.events.read(), commission_id)
    }

    pub fn events_for(&self, commission_id: Uuid) -> Vec<CommissionEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.commission_id == commission_id)
            .cloned()
            .collect()
    }

    /// Commission an affiliate has actually earned (approved or paid, not
    /// reversed), for reporting.
    pub fn earned_cents(&self, affiliate_id: AffiliateId) -> (u64, u64) {
        let events = self.events.read();
        let mut commission_ids: Vec<Uuid> = events
            .iter()
            .filter(|e| e.affiliate_id == affiliate_id)
            .map(|e| e.commission_id)
            .collect();
        commission_ids.sort_unstable();
        commission_ids.dedup();

        let mut revenue = 0u64;
        let mut commission = 0u64;
        for id in commission_ids {
            let stream: Vec<&CommissionEvent> =
                events.iter().filter(|e| e.commission_id == id).collect();
            let reversed = stream
                .iter()
                .any(|e| e.kind == CommissionEventKind::Reversed);
            if reversed {
                continue;
            }
            if let Some(created) = stream
                .iter()
                .find(|e| e.kind == CommissionEventKind::Created)
            {
                revenue += created.revenue_cents;
                commission += created.commission_cents;
            }
        }
        (revenue, commission)
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

fn fold_status(events: &[CommissionEvent], commission_id: Uuid) -> Option<CommissionStatus> {
    let mut status = None;
    for event in events.iter().filter(|e| e.commission_id == commission_id) {
        status = Some(match event.kind {
            CommissionEventKind::Created => CommissionStatus::Pending,
            CommissionEventKind::Approved => CommissionStatus::Approved,
            CommissionEventKind::Paid => CommissionStatus::Paid,
            CommissionEventKind::Reversed => CommissionStatus::Reversed,
        });
    }
    status
}

fn validate_transition(
    current: Option<CommissionStatus>,
    next: CommissionEventKind,
) -> ClinicResult<()> {
    let ok = matches!(
        (current, next),
        (None, CommissionEventKind::Created)
            | (Some(CommissionStatus::Pending), CommissionEventKind::Approved)
            | (Some(CommissionStatus::Pending), CommissionEventKind::Reversed)
            | (Some(CommissionStatus::Approved), CommissionEventKind::Paid)
            | (Some(CommissionStatus::Approved), CommissionEventKind::Reversed)
            | (Some(CommissionStatus::Paid), CommissionEventKind::Reversed)
    );
    if ok {
        Ok(())
    } else {
        Err(ClinicError::InvalidTransition {
            from: current
                .map(|s| format!("{s:?}"))
                .unwrap_or_else(|| "none".to_string()),
            to: format!("{next:?}"),
        })
    }
}

/// Convenience constructor for the initial event of a commission.
pub fn commission_created(
    idempotency_key: &str,
    clinic_id: ClinicId,
    affiliate_id: AffiliateId,
    patient_id: PatientId,
    revenue_cents: u64,
    commission_cents: u64,
) -> CommissionEvent {
    CommissionEvent {
        id: Uuid::new_v4(),
        commission_id: Uuid::new_v4(),
        idempotency_key: idempotency_key.to_string(),
        clinic_id,
        affiliate_id,
        patient_id,
        kind: CommissionEventKind::Created,
        revenue_cents,
        commission_cents,
        created_at: Utc::now(),
    }
}
