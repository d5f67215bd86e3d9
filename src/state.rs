use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{
    Actor, ApplicationId, AssignmentId, AssignmentStatus, BilledParty, BillingPeriod,
    PaymentMethod, PricingRowId, RecordLifecycle, StudentId, SyncState, TenantId, TransactionId,
    WaiverId, WaiverStatus,
};

/// suffix carried by provisional assignment descriptions until migration
pub const PROVISIONAL_MARKER: &str = " (Provisional)";

/// one billing obligation for one student or applicant, one period, one pricing row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeAssignment {
    pub id: AssignmentId,
    pub tenant_id: TenantId,
    pub party: BilledParty,
    pub pricing_row_id: PricingRowId,
    pub period: BillingPeriod,
    pub description: String,

    // amounts fixed at assignment time
    pub amount: Money,
    pub amount_discount: Money,
    pub amount_fine: Money,

    // settlement tracking
    pub paid_amount: Money,
    pub due_date: NaiveDate,
    pub is_partial_payment_allowed: bool,
    pub is_provisional: bool,
    pub status: AssignmentStatus,

    pub lifecycle: RecordLifecycle,
    pub sync: SyncState,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl FeeAssignment {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: TenantId,
        party: BilledParty,
        pricing_row_id: PricingRowId,
        period: BillingPeriod,
        description: String,
        amount: Money,
        amount_discount: Money,
        amount_fine: Money,
        due_date: NaiveDate,
        created_by: &Actor,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            party,
            pricing_row_id,
            period,
            description,
            amount,
            amount_discount,
            amount_fine,
            paid_amount: Money::ZERO,
            due_date,
            is_partial_payment_allowed: true,
            is_provisional: false,
            status: AssignmentStatus::Pending,
            lifecycle: RecordLifecycle::Active,
            sync: SyncState::Dirty,
            created_by: created_by.id,
            created_at,
        }
    }

    /// billed amount net of discount
    pub fn final_amount(&self) -> Money {
        self.amount - self.amount_discount
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        today > self.due_date
    }

    /// full amount owed on the given day; the fine is owed only once overdue
    pub fn total_due(&self, today: NaiveDate) -> Money {
        if self.is_overdue(today) {
            self.final_amount() + self.amount_fine
        } else {
            self.final_amount()
        }
    }

    /// what is still payable on the given day
    pub fn remaining_due(&self, today: NaiveDate) -> Money {
        self.total_due(today) - self.paid_amount
    }

    /// balance against the discounted amount, ignoring any fine
    pub fn outstanding(&self) -> Money {
        self.final_amount() - self.paid_amount
    }

    /// derive status from accumulated payments
    pub fn recompute_status(&mut self, today: NaiveDate) {
        self.status = if self.paid_amount.is_zero() {
            AssignmentStatus::Pending
        } else if self.paid_amount >= self.total_due(today) {
            AssignmentStatus::Paid
        } else {
            AssignmentStatus::Partial
        };
    }
}

/// immutable payment event; reversal is delete-and-recompute, never a negative entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeTransaction {
    pub id: TransactionId,
    pub tenant_id: TenantId,
    /// absent for advance payments not yet tied to an obligation
    pub assignment_id: Option<AssignmentId>,
    pub student_id: Option<StudentId>,
    pub amount_paid: Money,
    pub payment_date: DateTime<Utc>,
    pub method: PaymentMethod,
    /// sequential per assignment: "{assignmentId}/{n}"
    pub reference_no: String,
    pub note: Option<String>,

    // payment-time snapshot of the assignment's discount and fine
    pub discount_applied: Money,
    pub fine_applied: Money,

    pub is_advance: bool,
    /// unconsumed credit; only meaningful for advance records
    pub remaining_balance: Money,

    pub lifecycle: RecordLifecycle,
    pub created_by: Uuid,
    /// clock time the row was recorded. `payment_date` is caller-supplied and
    /// may be back-dated (a cheque dated yesterday), so the duplicate guard
    /// keys on this instead.
    pub created_at: DateTime<Utc>,
    /// insertion order, assigned by the store; breaks FIFO ties between equal payment dates
    pub seq: u64,
}

/// fine reduction request against one assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FineWaiver {
    pub id: WaiverId,
    pub tenant_id: TenantId,
    pub assignment_id: AssignmentId,
    pub original_fine_amount: Money,
    pub waiver_amount: Money,
    pub reason: String,
    pub status: WaiverStatus,
    pub requested_by: Actor,
    pub requested_at: DateTime<Utc>,
    pub decided_by: Option<Actor>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl FineWaiver {
    pub fn new(
        tenant_id: TenantId,
        assignment_id: AssignmentId,
        original_fine_amount: Money,
        waiver_amount: Money,
        reason: impl Into<String>,
        requested_by: Actor,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            assignment_id,
            original_fine_amount,
            waiver_amount,
            reason: reason.into(),
            status: WaiverStatus::Pending,
            requested_by,
            requested_at,
            decided_by: None,
            decided_at: None,
        }
    }
}

/// re-parent a provisional assignment onto an admitted student
pub fn migrate_to_student(assignment: &mut FeeAssignment, student_id: StudentId) {
    assignment.party = BilledParty::Student(student_id);
    assignment.is_provisional = false;
    if let Some(stripped) = assignment.description.strip_suffix(PROVISIONAL_MARKER) {
        assignment.description = stripped.to_string();
    }
    assignment.sync = SyncState::Dirty;
}

/// application the assignment still belongs to, if not yet migrated
pub fn application_of(assignment: &FeeAssignment) -> Option<ApplicationId> {
    assignment.party.application_id()
}
