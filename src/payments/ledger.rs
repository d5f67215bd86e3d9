use chrono::{DateTime, Duration, Utc};
use hourglass_rs::SafeTimeProvider;
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{FeeError, Result};
use crate::events::{Event, EventStore};
use crate::state::FeeTransaction;
use crate::store::FeeStore;
use crate::types::{
    Actor, AssignmentId, AssignmentStatus, PaymentMethod, RecordLifecycle, TenantContext,
    TransactionId,
};

/// double-submission guard: an identical amount against the same assignment
/// within this window is rejected. a heuristic, not concurrency control;
/// exclusive store access is what actually serializes the read-validate-write.
pub const DUPLICATE_GUARD_SECONDS: i64 = 10;

/// one payment to record against an assignment
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub assignment_id: AssignmentId,
    pub amount: Money,
    pub payment_date: DateTime<Utc>,
    pub method: PaymentMethod,
    pub note: Option<String>,
}

/// projection returned after a successful payment
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    pub transaction_id: TransactionId,
    pub reference_no: String,
    pub paid_amount: Money,
    pub remaining_due: Money,
    pub status: AssignmentStatus,
}

/// what a reversal undid
#[derive(Debug, Clone, PartialEq)]
pub struct RevertedPayment {
    pub transaction_id: TransactionId,
    pub amount: Money,
    pub paid_amount: Money,
    pub status: AssignmentStatus,
}

/// records payments against assignments and derives status from them
pub struct FeeTransactionLedger;

impl FeeTransactionLedger {
    pub fn new() -> Self {
        Self
    }

    /// record one payment. validates against current state first, then
    /// persists the transaction and updates the assignment as one unit;
    /// any validation failure leaves balances exactly as they were.
    pub fn save(
        &self,
        ctx: &TenantContext,
        request: &PaymentRequest,
        store: &mut FeeStore,
        actor: &Actor,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<PaymentReceipt> {
        let now = time_provider.now();
        let today = now.date_naive();

        let assignment = store.assignment(ctx, request.assignment_id)?;
        let tenant_id = assignment.tenant_id;
        let student_id = assignment.party.student_id();
        let discount_snapshot = assignment.amount_discount;
        let fine_snapshot = assignment.amount_fine;
        let partial_allowed = assignment.is_partial_payment_allowed;
        let remaining = assignment.remaining_due(today);
        let old_status = assignment.status;

        if !request.amount.is_positive() {
            return Err(FeeError::InvalidPaymentAmount {
                amount: request.amount,
            });
        }

        let existing = store.transactions_for_assignment(ctx, request.assignment_id)?;
        let window = Duration::seconds(DUPLICATE_GUARD_SECONDS);
        // keyed on when the earlier row was recorded, not its payment date;
        // payment dates are caller-supplied and may be back-dated
        if existing.iter().any(|t| {
            let age = now.signed_duration_since(t.created_at);
            t.amount_paid == request.amount && age >= Duration::zero() && age < window
        }) {
            return Err(FeeError::DuplicateTransaction {
                assignment_id: request.assignment_id,
                amount: request.amount,
            });
        }

        if request.amount > remaining {
            return Err(FeeError::Overpayment {
                remaining,
                provided: request.amount,
            });
        }

        if !partial_allowed && request.amount < remaining {
            return Err(FeeError::PartialPaymentNotAllowed {
                remaining,
                provided: request.amount,
            });
        }

        let reference_no = format!("{}/{}", request.assignment_id, existing.len() + 1);

        // validated; persist and update as one unit
        let transaction_id = store.insert_transaction(FeeTransaction {
            id: Uuid::new_v4(),
            tenant_id,
            assignment_id: Some(request.assignment_id),
            student_id,
            amount_paid: request.amount,
            payment_date: request.payment_date,
            method: request.method,
            reference_no: reference_no.clone(),
            note: request.note.clone(),
            discount_applied: discount_snapshot,
            fine_applied: fine_snapshot,
            is_advance: false,
            remaining_balance: Money::ZERO,
            lifecycle: RecordLifecycle::Active,
            created_by: actor.id,
            created_at: now,
            seq: 0,
        });

        let assignment = store.assignment_mut(ctx, request.assignment_id)?;
        assignment.paid_amount += request.amount;
        assignment.recompute_status(today);
        let new_status = assignment.status;
        let remaining_due = assignment.remaining_due(today);

        events.emit(Event::PaymentRecorded {
            assignment_id: request.assignment_id,
            transaction_id,
            amount: request.amount,
            reference_no: reference_no.clone(),
            timestamp: now,
        });
        if new_status != old_status {
            events.emit(Event::StatusChanged {
                assignment_id: request.assignment_id,
                old_status,
                new_status,
                timestamp: now,
            });
        }

        Ok(PaymentReceipt {
            transaction_id,
            reference_no,
            paid_amount: request.amount,
            remaining_due,
            status: new_status,
        })
    }

    /// delete a transaction and roll its amount back out of the assignment.
    /// an absent transaction is benign and returns `Ok(None)`; callers treat
    /// "already reverted" as a no-op, so this path never raises for it.
    pub fn revert(
        &self,
        ctx: &TenantContext,
        assignment_id: AssignmentId,
        transaction_id: TransactionId,
        store: &mut FeeStore,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Option<RevertedPayment>> {
        let now = time_provider.now();
        let today = now.date_naive();

        let assignment = store.assignment(ctx, assignment_id)?;
        let old_status = assignment.status;

        let belongs = store
            .transactions_for_assignment(ctx, assignment_id)?
            .iter()
            .any(|t| t.id == transaction_id);
        if !belongs {
            return Ok(None);
        }

        let removed = match store.remove_transaction(transaction_id) {
            Some(t) => t,
            None => return Ok(None),
        };

        let assignment = store.assignment_mut(ctx, assignment_id)?;
        assignment.paid_amount -= removed.amount_paid;
        assignment.recompute_status(today);
        let new_status = assignment.status;
        let paid_amount = assignment.paid_amount;

        events.emit(Event::PaymentReverted {
            assignment_id,
            transaction_id,
            amount: removed.amount_paid,
            timestamp: now,
        });
        if new_status != old_status {
            events.emit(Event::StatusChanged {
                assignment_id,
                old_status,
                new_status,
                timestamp: now,
            });
        }

        Ok(Some(RevertedPayment {
            transaction_id,
            amount: removed.amount_paid,
            paid_amount,
            status: new_status,
        }))
    }
}

impl Default for FeeTransactionLedger {
    fn default() -> Self {
        Self::new()
    }
}
