use hourglass_rs::SafeTimeProvider;

use crate::catalog::FeeCatalog;
use crate::decimal::Money;
use crate::errors::{FeeError, Result};
use crate::events::{Event, EventStore};
use crate::state::{migrate_to_student, FeeAssignment, PROVISIONAL_MARKER};
use crate::store::FeeStore;
use crate::types::{
    Actor, ApplicationId, AssignmentId, BilledParty, BillingFrequency, BillingPeriod, FeeGroupId,
    PricingRowId, StudentId, TenantContext,
};

/// fee group totals by frequency bucket, each net of discount, shown to applicants
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeePreview {
    pub total_one_time: Money,
    pub total_monthly: Money,
    /// quarterly, half-yearly and annual pooled together
    pub total_annual: Money,
}

/// mirrors the assignment engine for applicants not yet admitted,
/// and re-parents their obligations once admission completes
pub struct ProvisionalFeeManager;

impl ProvisionalFeeManager {
    pub fn new() -> Self {
        Self
    }

    /// read-only breakdown of what a fee group will cost an applicant
    pub fn fee_preview(
        &self,
        ctx: &TenantContext,
        group_id: FeeGroupId,
        catalog: &FeeCatalog,
        time_provider: &SafeTimeProvider,
    ) -> Result<FeePreview> {
        let group = catalog.group(group_id)?;
        ctx.check(group.tenant_id)?;
        let today = time_provider.now().date_naive();

        let mut preview = FeePreview::default();
        for row in catalog.rows_for_group(group_id) {
            let fee_type = catalog.fee_type(row.fee_type_id)?;
            let net = catalog.quote(row, row.amount, today).final_amount();
            match fee_type.frequency {
                BillingFrequency::OneTime => preview.total_one_time += net,
                BillingFrequency::Monthly => preview.total_monthly += net,
                BillingFrequency::Quarterly
                | BillingFrequency::HalfYearly
                | BillingFrequency::Annual => preview.total_annual += net,
            }
        }
        Ok(preview)
    }

    /// pre-bill an applicant for one-time fees only; recurring fees cannot
    /// be provisionally assigned. rows already assigned for the period are
    /// skipped, so the call is idempotent.
    #[allow(clippy::too_many_arguments)]
    pub fn assign_provisional_fees(
        &self,
        ctx: &TenantContext,
        application_id: ApplicationId,
        pricing_row_ids: &[PricingRowId],
        period: BillingPeriod,
        catalog: &mut FeeCatalog,
        store: &mut FeeStore,
        actor: &Actor,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Vec<AssignmentId>> {
        let now = time_provider.now();
        let today = now.date_naive();
        let party = BilledParty::Applicant(application_id);

        let mut planned: Vec<FeeAssignment> = Vec::new();
        let mut discount_uses: Vec<uuid::Uuid> = Vec::new();

        // stage: every row must validate before anything is written
        for &row_id in pricing_row_ids {
            let row = catalog.row(row_id)?;
            ctx.check(row.tenant_id)?;
            let fee_type = catalog.fee_type(row.fee_type_id)?;
            if fee_type.frequency.is_recurring() {
                return Err(FeeError::RecurringFeeNotProvisional { id: fee_type.id });
            }
            if store.find_assignment(ctx, party, row.id, period)?.is_some() {
                continue;
            }

            let quote = catalog.quote(row, row.amount, today);
            let due_date = row.due_date.unwrap_or_else(|| period.default_due_date());

            let mut assignment = FeeAssignment::new(
                row.tenant_id,
                party,
                row.id,
                period,
                format!("{}{PROVISIONAL_MARKER}", fee_type.name),
                quote.amount,
                quote.discount,
                quote.fine,
                due_date,
                actor,
                now,
            );
            assignment.is_provisional = true;
            planned.push(assignment);

            if quote.discount.is_positive() {
                if let Some(discount_id) = row.discount_id {
                    discount_uses.push(discount_id);
                }
            }
        }

        let created: Vec<AssignmentId> = planned
            .into_iter()
            .map(|a| store.insert_assignment(a))
            .collect();
        for discount_id in discount_uses {
            catalog.record_discount_use(discount_id);
        }

        if !created.is_empty() {
            events.emit(Event::ProvisionalFeesAssigned {
                application_id,
                assignment_ids: created.clone(),
                timestamp: now,
            });
        }

        Ok(created)
    }

    /// re-parent every provisional assignment of an admitted applicant onto
    /// the new student record. amounts, fines and transaction history are
    /// untouched; only ownership changes.
    pub fn migrate_provisional_fees(
        &self,
        ctx: &TenantContext,
        application_id: ApplicationId,
        student_id: StudentId,
        store: &mut FeeStore,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<usize> {
        // the query rejects cross-tenant references, so the whole batch is
        // validated before anything is touched
        let ids = store.assignment_ids_for_application(ctx, application_id)?;

        for &id in &ids {
            let assignment = store.assignment_mut(ctx, id)?;
            migrate_to_student(assignment, student_id);
        }

        events.emit(Event::ProvisionalFeesMigrated {
            application_id,
            student_id,
            migrated: ids.len(),
            timestamp: time_provider.now(),
        });

        Ok(ids.len())
    }
}

impl Default for ProvisionalFeeManager {
    fn default() -> Self {
        Self::new()
    }
}
