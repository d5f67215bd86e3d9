use hourglass_rs::SafeTimeProvider;
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{FeeError, Result};
use crate::events::{Event, EventStore};
use crate::state::FeeTransaction;
use crate::store::FeeStore;
use crate::types::{
    Actor, AssignmentId, PaymentMethod, RecordLifecycle, StudentId, TenantContext, TransactionId,
};

/// one advance credit consumption against an assignment
#[derive(Debug, Clone, PartialEq)]
pub struct AdvanceConsumption {
    pub source_transaction_id: TransactionId,
    pub consumption_transaction_id: TransactionId,
    pub amount: Money,
}

/// result of allocating advance credit to one assignment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvanceApplication {
    pub consumed: Vec<AdvanceConsumption>,
    pub total_applied: Money,
    pub remaining_outstanding: Money,
}

/// accepts payments not yet tied to an obligation and later consumes
/// that credit, oldest first, against outstanding assignments
pub struct AdvancePaymentAllocator;

impl AdvancePaymentAllocator {
    pub fn new() -> Self {
        Self
    }

    /// record credit for a student with no assignment reference. advances are
    /// not validated against any catalog obligation at creation time.
    #[allow(clippy::too_many_arguments)]
    pub fn record_advance(
        &self,
        ctx: &TenantContext,
        student_id: StudentId,
        amount: Money,
        method: PaymentMethod,
        note: Option<String>,
        store: &mut FeeStore,
        actor: &Actor,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<TransactionId> {
        if !amount.is_positive() {
            return Err(FeeError::InvalidPaymentAmount { amount });
        }

        let now = time_provider.now();
        let sequence = store.advance_history(ctx, student_id)?.len() + 1;

        let transaction_id = store.insert_transaction(FeeTransaction {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id,
            assignment_id: None,
            student_id: Some(student_id),
            amount_paid: amount,
            payment_date: now,
            method,
            reference_no: format!("ADV/{student_id}/{sequence}"),
            note,
            discount_applied: Money::ZERO,
            fine_applied: Money::ZERO,
            is_advance: true,
            remaining_balance: amount,
            lifecycle: RecordLifecycle::Active,
            created_by: actor.id,
            created_at: now,
            seq: 0,
        });

        events.emit(Event::AdvanceRecorded {
            transaction_id,
            student_id,
            amount,
            timestamp: now,
        });

        Ok(transaction_id)
    }

    /// total unconsumed advance credit for a student
    pub fn student_advance_balance(
        &self,
        ctx: &TenantContext,
        store: &FeeStore,
        student_id: StudentId,
    ) -> Result<Money> {
        store.advance_balance(ctx, student_id)
    }

    /// consume the student's open advance credits against one assignment,
    /// oldest payment date first. stops the moment the assignment is covered;
    /// leftover credit stays available. exhausted credits are kept as
    /// zero-balance records for audit.
    pub fn apply_to_assignment(
        &self,
        ctx: &TenantContext,
        student_id: StudentId,
        assignment_id: AssignmentId,
        store: &mut FeeStore,
        actor: &Actor,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<AdvanceApplication> {
        let now = time_provider.now();
        let today = now.date_naive();

        let assignment = store.assignment(ctx, assignment_id)?;
        let tenant_id = assignment.tenant_id;
        let discount_snapshot = assignment.amount_discount;
        let fine_snapshot = assignment.amount_fine;
        let old_status = assignment.status;
        let mut outstanding = assignment.outstanding();

        let credits: Vec<(TransactionId, Money, String)> = store
            .open_advance_credits(ctx, student_id)?
            .iter()
            .map(|t| (t.id, t.remaining_balance, t.reference_no.clone()))
            .collect();

        let mut application = AdvanceApplication {
            remaining_outstanding: outstanding,
            ..AdvanceApplication::default()
        };

        for (source_id, available, source_reference) in credits {
            if !outstanding.is_positive() {
                break;
            }
            let take = available.min(outstanding);

            let advance_remaining = match store.transaction_mut(source_id) {
                Some(source) => {
                    source.remaining_balance -= take;
                    source.remaining_balance
                }
                None => continue,
            };

            let sequence = store.transaction_count_for_assignment(ctx, assignment_id)? + 1;
            let consumption_transaction_id = store.insert_transaction(FeeTransaction {
                id: Uuid::new_v4(),
                tenant_id,
                assignment_id: Some(assignment_id),
                student_id: Some(student_id),
                amount_paid: take,
                payment_date: now,
                method: PaymentMethod::Cash,
                reference_no: format!("{assignment_id}/{sequence}"),
                note: Some(format!("applied from advance {source_reference}")),
                discount_applied: discount_snapshot,
                fine_applied: fine_snapshot,
                is_advance: false,
                remaining_balance: Money::ZERO,
                lifecycle: RecordLifecycle::Active,
                created_by: actor.id,
                created_at: now,
                seq: 0,
            });

            outstanding -= take;
            application.total_applied += take;
            application.consumed.push(AdvanceConsumption {
                source_transaction_id: source_id,
                consumption_transaction_id,
                amount: take,
            });

            events.emit(Event::AdvanceApplied {
                source_transaction_id: source_id,
                assignment_id,
                amount: take,
                advance_remaining,
                timestamp: now,
            });
        }

        if application.total_applied.is_positive() {
            let assignment = store.assignment_mut(ctx, assignment_id)?;
            assignment.paid_amount += application.total_applied;
            assignment.recompute_status(today);
            let new_status = assignment.status;
            if new_status != old_status {
                events.emit(Event::StatusChanged {
                    assignment_id,
                    old_status,
                    new_status,
                    timestamp: now,
                });
            }
        }

        application.remaining_outstanding = outstanding;
        Ok(application)
    }
}

impl Default for AdvancePaymentAllocator {
    fn default() -> Self {
        Self::new()
    }
}
