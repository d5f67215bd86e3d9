pub mod provisional;

use hourglass_rs::SafeTimeProvider;

use crate::catalog::FeeCatalog;
use crate::decimal::Money;
use crate::errors::Result;
use crate::events::{Event, EventStore};
use crate::state::FeeAssignment;
use crate::store::FeeStore;
use crate::types::{
    Actor, AssignmentId, BilledParty, BillingFrequency, BillingPeriod, FeeGroupId, FeeTypeId,
    StudentId, TenantContext,
};

pub use provisional::{FeePreview, ProvisionalFeeManager};

/// one student row in a selection: selected/deselected plus the student's
/// configured monthly fee (zero when none is configured)
#[derive(Debug, Clone, PartialEq)]
pub struct StudentSelection {
    pub student_id: StudentId,
    pub selected: bool,
    pub monthly_fee: Money,
}

/// target fee types, groups, billing period and the student roster to reconcile
#[derive(Debug, Clone, PartialEq)]
pub struct FeeSelection {
    pub fee_type_ids: Vec<FeeTypeId>,
    pub fee_group_ids: Vec<FeeGroupId>,
    pub period: BillingPeriod,
    pub students: Vec<StudentSelection>,
}

/// what one reconciliation run changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentOutcome {
    pub created: Vec<AssignmentId>,
    pub removed: Vec<AssignmentId>,
}

/// display fields for one student in a class/section roster
#[derive(Debug, Clone, PartialEq)]
pub struct RosterStudent {
    pub student_id: StudentId,
    pub name: String,
    pub admission_no: String,
    pub roll_no: String,
    pub class_label: String,
}

/// read-only projection of a roster against existing assignments
#[derive(Debug, Clone, PartialEq)]
pub struct RosterPreviewRow {
    pub student: RosterStudent,
    pub already_assigned: bool,
    /// re-selection is locked once any payment exists
    pub selection_locked: bool,
    pub billed_amount: Money,
}

/// turns catalog rows plus a student roster into concrete billing obligations
pub struct FeeAssignmentEngine;

impl FeeAssignmentEngine {
    pub fn new() -> Self {
        Self
    }

    /// reconcile a selection set: create obligations for newly selected
    /// students, remove untouched obligations for deselected ones.
    ///
    /// all writes are staged against current state first and applied as one
    /// unit, so a failure leaves no student half-billed. re-running with an
    /// unchanged selection is a no-op.
    #[allow(clippy::too_many_arguments)]
    pub fn assign_fees(
        &self,
        ctx: &TenantContext,
        selection: &FeeSelection,
        catalog: &mut FeeCatalog,
        store: &mut FeeStore,
        actor: &Actor,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<AssignmentOutcome> {
        let now = time_provider.now();
        let today = now.date_naive();

        let mut planned_creates: Vec<FeeAssignment> = Vec::new();
        let mut planned_removals: Vec<AssignmentId> = Vec::new();
        let mut discount_uses: Vec<uuid::Uuid> = Vec::new();

        // stage: validate everything against current state before any write
        for row in catalog.rows_for_selection(&selection.fee_group_ids, &selection.fee_type_ids) {
            ctx.check(row.tenant_id)?;
            let fee_type = catalog.fee_type(row.fee_type_id)?;
            let group = catalog.group(row.group_id)?;

            for student in &selection.students {
                let party = BilledParty::Student(student.student_id);
                let existing = store.find_assignment(ctx, party, row.id, selection.period)?;

                match (student.selected, existing) {
                    (true, None) => {
                        // monthly fees in a system group honour the student's
                        // configured monthly fee when one is set
                        let base = if fee_type.frequency == BillingFrequency::Monthly
                            && group.is_system
                            && student.monthly_fee.is_positive()
                        {
                            student.monthly_fee
                        } else {
                            row.amount
                        };

                        let quote = catalog.quote(row, base, today);
                        let due_date = row
                            .due_date
                            .unwrap_or_else(|| selection.period.default_due_date());

                        planned_creates.push(FeeAssignment::new(
                            row.tenant_id,
                            party,
                            row.id,
                            selection.period,
                            fee_type.name.clone(),
                            quote.amount,
                            quote.discount,
                            quote.fine,
                            due_date,
                            actor,
                            now,
                        ));

                        if quote.discount.is_positive() {
                            if let Some(discount_id) = row.discount_id {
                                discount_uses.push(discount_id);
                            }
                        }
                    }
                    (false, Some(assignment)) => {
                        // destructive only for untouched obligations
                        if store.transaction_count_for_assignment(ctx, assignment.id)? == 0 {
                            planned_removals.push(assignment.id);
                        }
                    }
                    _ => {}
                }
            }
        }

        // apply: infallible from here on
        let mut outcome = AssignmentOutcome::default();

        for assignment in planned_creates {
            events.emit(Event::FeeAssigned {
                assignment_id: assignment.id,
                party: assignment.party,
                final_amount: assignment.final_amount(),
                timestamp: now,
            });
            outcome.created.push(store.insert_assignment(assignment));
        }

        for id in planned_removals {
            if let Some(removed) = store.remove_assignment(id) {
                events.emit(Event::FeeAssignmentRemoved {
                    assignment_id: removed.id,
                    party: removed.party,
                    timestamp: now,
                });
                outcome.removed.push(id);
            }
        }

        for discount_id in discount_uses {
            catalog.record_discount_use(discount_id);
        }

        Ok(outcome)
    }

    /// preview a roster against existing assignments for a period; read-only
    pub fn roster_preview(
        &self,
        ctx: &TenantContext,
        period: BillingPeriod,
        fee_group_ids: &[FeeGroupId],
        fee_type_ids: &[FeeTypeId],
        roster: &[RosterStudent],
        catalog: &FeeCatalog,
        store: &FeeStore,
    ) -> Result<Vec<RosterPreviewRow>> {
        let rows = catalog.rows_for_selection(fee_group_ids, fee_type_ids);
        for row in &rows {
            ctx.check(row.tenant_id)?;
        }

        let mut preview = Vec::with_capacity(roster.len());
        for student in roster {
            let party = BilledParty::Student(student.student_id);
            let mut already_assigned = false;
            let mut selection_locked = false;
            let mut billed_amount = Money::ZERO;

            for row in &rows {
                if let Some(assignment) = store.find_assignment(ctx, party, row.id, period)? {
                    already_assigned = true;
                    billed_amount += assignment.final_amount();
                    if store.transaction_count_for_assignment(ctx, assignment.id)? > 0 {
                        selection_locked = true;
                    }
                }
            }

            preview.push(RosterPreviewRow {
                student: student.clone(),
                already_assigned,
                selection_locked,
                billed_amount,
            });
        }

        Ok(preview)
    }
}

impl Default for FeeAssignmentEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FeeDiscount, FeeGroup, FeeType};
    use crate::decimal::Rate;
    use crate::state::FeeTransaction;
    use crate::types::{DiscountKind, FinePolicy, PaymentMethod, RecordLifecycle};
    use chrono::{NaiveDate, TimeZone, Utc};
    use hourglass_rs::TimeSource;
    use uuid::Uuid;

    struct Fixture {
        ctx: TenantContext,
        catalog: FeeCatalog,
        store: FeeStore,
        actor: Actor,
        row_id: Uuid,
        period: BillingPeriod,
    }

    fn fixture(frequency: BillingFrequency, is_system: bool) -> Fixture {
        let tenant = Uuid::new_v4();
        let mut catalog = FeeCatalog::new();
        let group = catalog.add_group(FeeGroup::new(tenant, "Tuition", is_system));
        let fee_type =
            catalog.add_fee_type(FeeType::new(tenant, "Tuition Fee", "TUI", frequency));
        let row_id = catalog
            .add_pricing_row(
                group,
                fee_type,
                Money::from_major(1_000),
                None,
                FinePolicy::Percentage(Rate::from_percentage(5)),
                None,
            )
            .unwrap();

        Fixture {
            ctx: TenantContext::new(tenant, Uuid::new_v4()),
            catalog,
            store: FeeStore::new(),
            actor: Actor::new(Uuid::new_v4(), "clerk"),
            row_id,
            period: BillingPeriod::new(4, 2026).unwrap(),
        }
    }

    fn selection(fx: &Fixture, students: Vec<StudentSelection>) -> FeeSelection {
        let row = fx.catalog.row(fx.row_id).unwrap();
        FeeSelection {
            fee_type_ids: vec![row.fee_type_id],
            fee_group_ids: vec![row.group_id],
            period: fx.period,
            students,
        }
    }

    fn time() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_assign_creates_with_default_due_date() {
        let mut fx = fixture(BillingFrequency::Monthly, false);
        let student = Uuid::new_v4();
        let engine = FeeAssignmentEngine::new();
        let mut events = EventStore::new();

        let sel = selection(
            &fx,
            vec![StudentSelection {
                student_id: student,
                selected: true,
                monthly_fee: Money::ZERO,
            }],
        );
        let outcome = engine
            .assign_fees(
                &fx.ctx,
                &sel,
                &mut fx.catalog,
                &mut fx.store,
                &fx.actor,
                &time(),
                &mut events,
            )
            .unwrap();

        assert_eq!(outcome.created.len(), 1);
        let assignment = fx.store.assignment(&fx.ctx, outcome.created[0]).unwrap();
        assert_eq!(assignment.amount, Money::from_major(1_000));
        assert_eq!(assignment.amount_fine, Money::from_major(50));
        assert_eq!(
            assignment.due_date,
            NaiveDate::from_ymd_opt(2026, 4, 12).unwrap()
        );
        assert!(assignment.is_partial_payment_allowed);
    }

    #[test]
    fn test_monthly_fee_override_on_system_group() {
        let mut fx = fixture(BillingFrequency::Monthly, true);
        let student = Uuid::new_v4();
        let engine = FeeAssignmentEngine::new();
        let mut events = EventStore::new();

        let sel = selection(
            &fx,
            vec![StudentSelection {
                student_id: student,
                selected: true,
                monthly_fee: Money::from_major(750),
            }],
        );
        let outcome = engine
            .assign_fees(
                &fx.ctx,
                &sel,
                &mut fx.catalog,
                &mut fx.store,
                &fx.actor,
                &time(),
                &mut events,
            )
            .unwrap();

        let assignment = fx.store.assignment(&fx.ctx, outcome.created[0]).unwrap();
        assert_eq!(assignment.amount, Money::from_major(750));
        // fine follows the billed amount, not the catalog amount
        assert_eq!(assignment.amount_fine, Money::from_str_exact("37.50").unwrap());
    }

    #[test]
    fn test_one_time_fee_ignores_monthly_override() {
        let mut fx = fixture(BillingFrequency::OneTime, true);
        let student = Uuid::new_v4();
        let engine = FeeAssignmentEngine::new();
        let mut events = EventStore::new();

        let sel = selection(
            &fx,
            vec![StudentSelection {
                student_id: student,
                selected: true,
                monthly_fee: Money::from_major(750),
            }],
        );
        let outcome = engine
            .assign_fees(
                &fx.ctx,
                &sel,
                &mut fx.catalog,
                &mut fx.store,
                &fx.actor,
                &time(),
                &mut events,
            )
            .unwrap();

        let assignment = fx.store.assignment(&fx.ctx, outcome.created[0]).unwrap();
        assert_eq!(assignment.amount, Money::from_major(1_000));
    }

    #[test]
    fn test_reassign_is_idempotent() {
        let mut fx = fixture(BillingFrequency::Monthly, false);
        let student = Uuid::new_v4();
        let engine = FeeAssignmentEngine::new();
        let mut events = EventStore::new();

        let sel = selection(
            &fx,
            vec![StudentSelection {
                student_id: student,
                selected: true,
                monthly_fee: Money::ZERO,
            }],
        );
        for _ in 0..2 {
            engine
                .assign_fees(
                    &fx.ctx,
                    &sel,
                    &mut fx.catalog,
                    &mut fx.store,
                    &fx.actor,
                    &time(),
                    &mut events,
                )
                .unwrap();
        }

        assert_eq!(fx.store.assignment_count(), 1);
    }

    #[test]
    fn test_deselect_removes_only_untouched_assignments() {
        let mut fx = fixture(BillingFrequency::Monthly, false);
        let paid_student = Uuid::new_v4();
        let unpaid_student = Uuid::new_v4();
        let engine = FeeAssignmentEngine::new();
        let mut events = EventStore::new();

        let select_both = selection(
            &fx,
            vec![
                StudentSelection {
                    student_id: paid_student,
                    selected: true,
                    monthly_fee: Money::ZERO,
                },
                StudentSelection {
                    student_id: unpaid_student,
                    selected: true,
                    monthly_fee: Money::ZERO,
                },
            ],
        );
        let outcome = engine
            .assign_fees(
                &fx.ctx,
                &select_both,
                &mut fx.catalog,
                &mut fx.store,
                &fx.actor,
                &time(),
                &mut events,
            )
            .unwrap();
        assert_eq!(outcome.created.len(), 2);

        // record a payment against the first student's assignment
        let paid_assignment = *outcome
            .created
            .iter()
            .find(|id| {
                fx.store.assignment(&fx.ctx, **id).unwrap().party
                    == BilledParty::Student(paid_student)
            })
            .unwrap();
        fx.store.insert_transaction(FeeTransaction {
            id: Uuid::new_v4(),
            tenant_id: fx.ctx.tenant_id,
            assignment_id: Some(paid_assignment),
            student_id: Some(paid_student),
            amount_paid: Money::from_major(100),
            payment_date: Utc.with_ymd_and_hms(2026, 4, 2, 9, 0, 0).unwrap(),
            method: PaymentMethod::Cash,
            reference_no: format!("{paid_assignment}/1"),
            note: None,
            discount_applied: Money::ZERO,
            fine_applied: Money::ZERO,
            is_advance: false,
            remaining_balance: Money::ZERO,
            lifecycle: RecordLifecycle::Active,
            created_by: fx.actor.id,
            created_at: Utc.with_ymd_and_hms(2026, 4, 2, 9, 0, 0).unwrap(),
            seq: 0,
        });

        let deselect_both = selection(
            &fx,
            vec![
                StudentSelection {
                    student_id: paid_student,
                    selected: false,
                    monthly_fee: Money::ZERO,
                },
                StudentSelection {
                    student_id: unpaid_student,
                    selected: false,
                    monthly_fee: Money::ZERO,
                },
            ],
        );
        let outcome = engine
            .assign_fees(
                &fx.ctx,
                &deselect_both,
                &mut fx.catalog,
                &mut fx.store,
                &fx.actor,
                &time(),
                &mut events,
            )
            .unwrap();

        // only the untouched assignment goes away
        assert_eq!(outcome.removed.len(), 1);
        assert_eq!(fx.store.assignment_count(), 1);
        assert!(fx.store.assignment(&fx.ctx, paid_assignment).is_ok());
    }

    #[test]
    fn test_discount_applied_and_use_counted() {
        let mut fx = fixture(BillingFrequency::Monthly, false);
        let tenant = fx.ctx.tenant_id;
        let discount = FeeDiscount::new(
            tenant,
            "Sibling",
            DiscountKind::Percentage(Rate::from_percentage(10)),
        );
        let discount_id = discount.id;
        fx.catalog.add_discount(discount);

        // new row wired to the discount
        let row = fx.catalog.row(fx.row_id).unwrap().clone();
        fx.catalog.retire_pricing_row(fx.row_id).unwrap();
        let row_id = fx
            .catalog
            .add_pricing_row(
                row.group_id,
                row.fee_type_id,
                row.amount,
                None,
                row.fine_policy,
                Some(discount_id),
            )
            .unwrap();
        fx.row_id = row_id;

        let engine = FeeAssignmentEngine::new();
        let mut events = EventStore::new();
        let sel = selection(
            &fx,
            vec![StudentSelection {
                student_id: Uuid::new_v4(),
                selected: true,
                monthly_fee: Money::ZERO,
            }],
        );
        let outcome = engine
            .assign_fees(
                &fx.ctx,
                &sel,
                &mut fx.catalog,
                &mut fx.store,
                &fx.actor,
                &time(),
                &mut events,
            )
            .unwrap();

        let assignment = fx.store.assignment(&fx.ctx, outcome.created[0]).unwrap();
        assert_eq!(assignment.amount_discount, Money::from_major(100));
        assert_eq!(assignment.final_amount(), Money::from_major(900));
        assert_eq!(fx.catalog.discount(discount_id).unwrap().use_count, 1);
    }

    #[test]
    fn test_roster_preview_reports_assignment_state() {
        let mut fx = fixture(BillingFrequency::Monthly, false);
        let student = Uuid::new_v4();
        let engine = FeeAssignmentEngine::new();
        let mut events = EventStore::new();

        let sel = selection(
            &fx,
            vec![StudentSelection {
                student_id: student,
                selected: true,
                monthly_fee: Money::ZERO,
            }],
        );
        engine
            .assign_fees(
                &fx.ctx,
                &sel,
                &mut fx.catalog,
                &mut fx.store,
                &fx.actor,
                &time(),
                &mut events,
            )
            .unwrap();

        let roster = vec![
            RosterStudent {
                student_id: student,
                name: "Asha Verma".to_string(),
                admission_no: "A-101".to_string(),
                roll_no: "17".to_string(),
                class_label: "VI-B".to_string(),
            },
            RosterStudent {
                student_id: Uuid::new_v4(),
                name: "Rohan Das".to_string(),
                admission_no: "A-102".to_string(),
                roll_no: "18".to_string(),
                class_label: "VI-B".to_string(),
            },
        ];
        let row = fx.catalog.row(fx.row_id).unwrap();
        let preview = engine
            .roster_preview(
                &fx.ctx,
                fx.period,
                &[row.group_id],
                &[row.fee_type_id],
                &roster,
                &fx.catalog,
                &fx.store,
            )
            .unwrap();

        assert!(preview[0].already_assigned);
        assert!(!preview[0].selection_locked);
        assert_eq!(preview[0].billed_amount, Money::from_major(1_000));
        assert!(!preview[1].already_assigned);
        assert_eq!(preview[1].billed_amount, Money::ZERO);
    }
}
