use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::decimal::Money;
use crate::errors::{FeeError, Result};
use crate::state::{FeeAssignment, FeeTransaction, FineWaiver};
use crate::types::{
    ApplicationId, AssignmentId, BilledParty, BillingPeriod, PricingRowId, StudentId, SyncState,
    TenantContext, TransactionId, WaiverId,
};

/// aggregate store for the fee subsystem.
///
/// every query is a named, typed function rather than a dynamic filter
/// expression; every tenant-scoped read rejects cross-tenant references
/// instead of silently filtering them. mutating operations take `&mut self`,
/// so each read-validate-write sequence runs exclusively.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FeeStore {
    assignments: HashMap<AssignmentId, FeeAssignment>,
    transactions: Vec<FeeTransaction>,
    waivers: HashMap<WaiverId, FineWaiver>,
    next_seq: u64,
}

impl FeeStore {
    pub fn new() -> Self {
        Self::default()
    }

    // assignments

    pub(crate) fn insert_assignment(&mut self, assignment: FeeAssignment) -> AssignmentId {
        let id = assignment.id;
        self.assignments.insert(id, assignment);
        id
    }

    /// load an active assignment, rejecting cross-tenant access
    pub fn assignment(&self, ctx: &TenantContext, id: AssignmentId) -> Result<&FeeAssignment> {
        let assignment = self
            .assignments
            .get(&id)
            .filter(|a| a.lifecycle.is_active())
            .ok_or(FeeError::InvalidAssignment { id })?;
        ctx.check(assignment.tenant_id)?;
        Ok(assignment)
    }

    pub(crate) fn assignment_mut(
        &mut self,
        ctx: &TenantContext,
        id: AssignmentId,
    ) -> Result<&mut FeeAssignment> {
        let assignment = self
            .assignments
            .get_mut(&id)
            .filter(|a| a.lifecycle.is_active())
            .ok_or(FeeError::InvalidAssignment { id })?;
        ctx.check(assignment.tenant_id)?;
        assignment.sync = SyncState::Dirty;
        Ok(assignment)
    }

    /// the one assignment for a party, pricing row and period, if any
    pub fn find_assignment(
        &self,
        ctx: &TenantContext,
        party: BilledParty,
        pricing_row_id: PricingRowId,
        period: BillingPeriod,
    ) -> Result<Option<&FeeAssignment>> {
        match self.assignments.values().find(|a| {
            a.lifecycle.is_active()
                && a.party == party
                && a.pricing_row_id == pricing_row_id
                && a.period == period
        }) {
            Some(assignment) => {
                ctx.check(assignment.tenant_id)?;
                Ok(Some(assignment))
            }
            None => Ok(None),
        }
    }

    /// active assignments billed to one student, creation order
    pub fn assignments_for_student(
        &self,
        ctx: &TenantContext,
        student_id: StudentId,
    ) -> Result<Vec<&FeeAssignment>> {
        let mut found: Vec<&FeeAssignment> = self
            .assignments
            .values()
            .filter(|a| a.lifecycle.is_active() && a.party == BilledParty::Student(student_id))
            .collect();
        for a in &found {
            ctx.check(a.tenant_id)?;
        }
        found.sort_by_key(|a| a.created_at);
        Ok(found)
    }

    /// active assignments still parented to one application
    pub fn assignments_for_application(
        &self,
        ctx: &TenantContext,
        application_id: ApplicationId,
    ) -> Result<Vec<&FeeAssignment>> {
        let mut found: Vec<&FeeAssignment> = self
            .assignments
            .values()
            .filter(|a| a.lifecycle.is_active() && a.party == BilledParty::Applicant(application_id))
            .collect();
        for a in &found {
            ctx.check(a.tenant_id)?;
        }
        found.sort_by_key(|a| a.created_at);
        Ok(found)
    }

    pub(crate) fn assignment_ids_for_application(
        &self,
        ctx: &TenantContext,
        application_id: ApplicationId,
    ) -> Result<Vec<AssignmentId>> {
        Ok(self
            .assignments_for_application(ctx, application_id)?
            .iter()
            .map(|a| a.id)
            .collect())
    }

    /// hard-delete an assignment and cascade to its owned transactions
    pub(crate) fn remove_assignment(&mut self, id: AssignmentId) -> Option<FeeAssignment> {
        let removed = self.assignments.remove(&id);
        if removed.is_some() {
            self.transactions.retain(|t| t.assignment_id != Some(id));
        }
        removed
    }

    // transactions

    pub(crate) fn insert_transaction(&mut self, mut transaction: FeeTransaction) -> TransactionId {
        transaction.seq = self.next_seq;
        self.next_seq += 1;
        let id = transaction.id;
        self.transactions.push(transaction);
        id
    }

    /// active payment events against one assignment, insertion order
    pub fn transactions_for_assignment(
        &self,
        ctx: &TenantContext,
        id: AssignmentId,
    ) -> Result<Vec<&FeeTransaction>> {
        let found: Vec<&FeeTransaction> = self
            .transactions
            .iter()
            .filter(|t| t.lifecycle.is_active() && t.assignment_id == Some(id))
            .collect();
        for t in &found {
            ctx.check(t.tenant_id)?;
        }
        Ok(found)
    }

    pub fn transaction_count_for_assignment(
        &self,
        ctx: &TenantContext,
        id: AssignmentId,
    ) -> Result<usize> {
        Ok(self.transactions_for_assignment(ctx, id)?.len())
    }

    pub(crate) fn transaction_mut(&mut self, id: TransactionId) -> Option<&mut FeeTransaction> {
        self.transactions
            .iter_mut()
            .find(|t| t.lifecycle.is_active() && t.id == id)
    }

    /// hard-delete one transaction, returning it
    pub(crate) fn remove_transaction(&mut self, id: TransactionId) -> Option<FeeTransaction> {
        let index = self.transactions.iter().position(|t| t.id == id)?;
        Some(self.transactions.remove(index))
    }

    /// advance credits with unconsumed balance for one student,
    /// FIFO: payment date ascending, insertion sequence breaking ties
    pub fn open_advance_credits(
        &self,
        ctx: &TenantContext,
        student_id: StudentId,
    ) -> Result<Vec<&FeeTransaction>> {
        let mut credits: Vec<&FeeTransaction> = self
            .transactions
            .iter()
            .filter(|t| {
                t.lifecycle.is_active()
                    && t.is_advance
                    && t.student_id == Some(student_id)
                    && t.remaining_balance.is_positive()
            })
            .collect();
        for t in &credits {
            ctx.check(t.tenant_id)?;
        }
        credits.sort_by_key(|t| (t.payment_date, t.seq));
        Ok(credits)
    }

    /// total unconsumed advance credit for one student
    pub fn advance_balance(&self, ctx: &TenantContext, student_id: StudentId) -> Result<Money> {
        Ok(self
            .open_advance_credits(ctx, student_id)?
            .iter()
            .fold(Money::ZERO, |sum, t| sum + t.remaining_balance))
    }

    /// every advance record for one student, exhausted ones included, for audit
    pub fn advance_history(
        &self,
        ctx: &TenantContext,
        student_id: StudentId,
    ) -> Result<Vec<&FeeTransaction>> {
        let mut credits: Vec<&FeeTransaction> = self
            .transactions
            .iter()
            .filter(|t| t.lifecycle.is_active() && t.is_advance && t.student_id == Some(student_id))
            .collect();
        for t in &credits {
            ctx.check(t.tenant_id)?;
        }
        credits.sort_by_key(|t| (t.payment_date, t.seq));
        Ok(credits)
    }

    // waivers

    pub(crate) fn insert_waiver(&mut self, waiver: FineWaiver) -> WaiverId {
        let id = waiver.id;
        self.waivers.insert(id, waiver);
        id
    }

    pub fn waiver(&self, ctx: &TenantContext, id: WaiverId) -> Result<&FineWaiver> {
        let waiver = self
            .waivers
            .get(&id)
            .ok_or(FeeError::WaiverNotFound { id })?;
        ctx.check(waiver.tenant_id)?;
        Ok(waiver)
    }

    pub(crate) fn waiver_mut(&mut self, ctx: &TenantContext, id: WaiverId) -> Result<&mut FineWaiver> {
        let waiver = self
            .waivers
            .get_mut(&id)
            .ok_or(FeeError::WaiverNotFound { id })?;
        ctx.check(waiver.tenant_id)?;
        Ok(waiver)
    }

    // synchronization bookkeeping

    /// records the downstream sync layer has not yet picked up
    pub fn dirty_assignments(&self) -> Vec<&FeeAssignment> {
        self.assignments
            .values()
            .filter(|a| a.sync == SyncState::Dirty)
            .collect()
    }

    pub fn mark_assignment_synced(&mut self, id: AssignmentId) {
        if let Some(a) = self.assignments.get_mut(&id) {
            a.sync = SyncState::Synced;
        }
    }

    // snapshots

    /// serialize the full store state to JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// restore a store from a JSON snapshot
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    #[cfg(test)]
    pub(crate) fn assignment_count(&self) -> usize {
        self.assignments
            .values()
            .filter(|a| a.lifecycle.is_active())
            .count()
    }
}
