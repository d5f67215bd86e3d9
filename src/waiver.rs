use hourglass_rs::SafeTimeProvider;

use crate::decimal::Money;
use crate::errors::{FeeError, Result};
use crate::events::{Event, EventStore};
use crate::state::FineWaiver;
use crate::store::FeeStore;
use crate::types::{Actor, AssignmentId, TenantContext, WaiverId, WaiverStatus};

/// request/approve/reject flow that reduces a previously computed fine.
/// Pending -> Approved or Pending -> Rejected, both terminal.
pub struct FineWaiverWorkflow;

impl FineWaiverWorkflow {
    pub fn new() -> Self {
        Self
    }

    /// open a pending waiver capturing the standing fine; the assignment is
    /// not touched until approval
    #[allow(clippy::too_many_arguments)]
    pub fn request(
        &self,
        ctx: &TenantContext,
        assignment_id: AssignmentId,
        waiver_amount: Money,
        reason: impl Into<String>,
        store: &mut FeeStore,
        requested_by: &Actor,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<WaiverId> {
        let now = time_provider.now();
        let assignment = store.assignment(ctx, assignment_id)?;
        let original_fine = assignment.amount_fine;

        if !waiver_amount.is_positive() {
            return Err(FeeError::InvalidConfiguration {
                message: format!("waiver amount must be positive, got {waiver_amount}"),
            });
        }
        if waiver_amount > original_fine {
            return Err(FeeError::WaiverExceedsFine {
                requested: waiver_amount,
                fine: original_fine,
            });
        }

        let waiver = FineWaiver::new(
            assignment.tenant_id,
            assignment_id,
            original_fine,
            waiver_amount,
            reason,
            requested_by.clone(),
            now,
        );
        let waiver_id = store.insert_waiver(waiver);

        events.emit(Event::WaiverRequested {
            waiver_id,
            assignment_id,
            waiver_amount,
            timestamp: now,
        });

        Ok(waiver_id)
    }

    /// approve a pending waiver: the assignment's fine drops by the waiver
    /// amount, floored at zero. irreversible.
    pub fn approve(
        &self,
        ctx: &TenantContext,
        waiver_id: WaiverId,
        approver: &Actor,
        store: &mut FeeStore,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        let now = time_provider.now();
        let today = now.date_naive();

        let (assignment_id, waiver_amount) = {
            let waiver = store.waiver(ctx, waiver_id)?;
            if waiver.status != WaiverStatus::Pending {
                return Err(FeeError::WaiverNotPending {
                    status: waiver.status,
                });
            }
            (waiver.assignment_id, waiver.waiver_amount)
        };

        let assignment = store.assignment_mut(ctx, assignment_id)?;
        assignment.amount_fine = (assignment.amount_fine - waiver_amount).max(Money::ZERO);
        // a smaller fine can tip an overdue assignment into fully settled
        assignment.recompute_status(today);

        let waiver = store.waiver_mut(ctx, waiver_id)?;
        waiver.status = WaiverStatus::Approved;
        waiver.decided_by = Some(approver.clone());
        waiver.decided_at = Some(now);

        events.emit(Event::WaiverDecided {
            waiver_id,
            assignment_id,
            status: WaiverStatus::Approved,
            timestamp: now,
        });

        Ok(())
    }

    /// reject a pending waiver; the assignment is left untouched. irreversible.
    pub fn reject(
        &self,
        ctx: &TenantContext,
        waiver_id: WaiverId,
        approver: &Actor,
        store: &mut FeeStore,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        let now = time_provider.now();

        let waiver = store.waiver_mut(ctx, waiver_id)?;
        if waiver.status != WaiverStatus::Pending {
            return Err(FeeError::WaiverNotPending {
                status: waiver.status,
            });
        }
        let assignment_id = waiver.assignment_id;
        waiver.status = WaiverStatus::Rejected;
        waiver.decided_by = Some(approver.clone());
        waiver.decided_at = Some(now);

        events.emit(Event::WaiverDecided {
            waiver_id,
            assignment_id,
            status: WaiverStatus::Rejected,
            timestamp: now,
        });

        Ok(())
    }
}

impl Default for FineWaiverWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FeeAssignment;
    use crate::types::{AssignmentStatus, BilledParty, BillingPeriod};
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use hourglass_rs::TimeSource;
    use uuid::Uuid;

    struct Fixture {
        ctx: TenantContext,
        store: FeeStore,
        requester: Actor,
        approver: Actor,
        assignment_id: AssignmentId,
        time: SafeTimeProvider,
    }

    // final 900, fine 45, due 2026-04-12, clock at 2026-04-01
    fn fixture() -> Fixture {
        let tenant = Uuid::new_v4();
        let requester = Actor::new(Uuid::new_v4(), "class teacher");
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap(),
        ));

        let assignment = FeeAssignment::new(
            tenant,
            BilledParty::Student(Uuid::new_v4()),
            Uuid::new_v4(),
            BillingPeriod::new(4, 2026).unwrap(),
            "Tuition Fee".to_string(),
            Money::from_major(1_000),
            Money::from_major(100),
            Money::from_major(45),
            NaiveDate::from_ymd_opt(2026, 4, 12).unwrap(),
            &requester,
            time.now(),
        );

        let mut store = FeeStore::new();
        let assignment_id = store.insert_assignment(assignment);

        Fixture {
            ctx: TenantContext::new(tenant, Uuid::new_v4()),
            store,
            requester,
            approver: Actor::new(Uuid::new_v4(), "principal"),
            assignment_id,
            time,
        }
    }

    fn request(fx: &mut Fixture, amount: i64) -> WaiverId {
        let workflow = FineWaiverWorkflow::new();
        let mut events = EventStore::new();
        workflow
            .request(
                &fx.ctx,
                fx.assignment_id,
                Money::from_major(amount),
                "hardship",
                &mut fx.store,
                &fx.requester,
                &fx.time,
                &mut events,
            )
            .unwrap()
    }

    #[test]
    fn test_request_captures_standing_fine() {
        let mut fx = fixture();
        let waiver_id = request(&mut fx, 20);

        let waiver = fx.store.waiver(&fx.ctx, waiver_id).unwrap();
        assert_eq!(waiver.status, WaiverStatus::Pending);
        assert_eq!(waiver.original_fine_amount, Money::from_major(45));
        assert_eq!(waiver.waiver_amount, Money::from_major(20));
        assert!(waiver.decided_by.is_none());

        // the assignment is untouched until approval
        let assignment = fx.store.assignment(&fx.ctx, fx.assignment_id).unwrap();
        assert_eq!(assignment.amount_fine, Money::from_major(45));
    }

    #[test]
    fn test_waiver_exceeding_fine_rejected() {
        let mut fx = fixture();
        let workflow = FineWaiverWorkflow::new();
        let mut events = EventStore::new();

        let result = workflow.request(
            &fx.ctx,
            fx.assignment_id,
            Money::from_major(100),
            "hardship",
            &mut fx.store,
            &fx.requester,
            &fx.time,
            &mut events,
        );
        assert!(matches!(result, Err(FeeError::WaiverExceedsFine { .. })));
    }

    #[test]
    fn test_approval_reduces_fine() {
        let mut fx = fixture();
        let workflow = FineWaiverWorkflow::new();
        let mut events = EventStore::new();
        let waiver_id = request(&mut fx, 20);

        workflow
            .approve(
                &fx.ctx,
                waiver_id,
                &fx.approver,
                &mut fx.store,
                &fx.time,
                &mut events,
            )
            .unwrap();

        let assignment = fx.store.assignment(&fx.ctx, fx.assignment_id).unwrap();
        assert_eq!(assignment.amount_fine, Money::from_major(25));

        let waiver = fx.store.waiver(&fx.ctx, waiver_id).unwrap();
        assert_eq!(waiver.status, WaiverStatus::Approved);
        assert_eq!(waiver.decided_by.as_ref().unwrap().id, fx.approver.id);
        assert!(waiver.decided_at.is_some());
    }

    #[test]
    fn test_full_waiver_can_settle_overdue_assignment() {
        let mut fx = fixture();
        let workflow = FineWaiverWorkflow::new();
        let mut events = EventStore::new();

        // overdue with the discounted amount already paid; only the fine stands
        fx.time.test_control().unwrap().advance(Duration::days(15));
        {
            let assignment = fx.store.assignment_mut(&fx.ctx, fx.assignment_id).unwrap();
            assignment.paid_amount = Money::from_major(900);
            assignment.recompute_status(fx.time.now().date_naive());
            assert_eq!(assignment.status, AssignmentStatus::Partial);
        }

        let waiver_id = request(&mut fx, 45);
        workflow
            .approve(
                &fx.ctx,
                waiver_id,
                &fx.approver,
                &mut fx.store,
                &fx.time,
                &mut events,
            )
            .unwrap();

        let assignment = fx.store.assignment(&fx.ctx, fx.assignment_id).unwrap();
        assert_eq!(assignment.amount_fine, Money::ZERO);
        assert_eq!(assignment.status, AssignmentStatus::Paid);
    }

    #[test]
    fn test_decisions_are_terminal() {
        let mut fx = fixture();
        let workflow = FineWaiverWorkflow::new();
        let mut events = EventStore::new();

        let approved = request(&mut fx, 10);
        workflow
            .approve(
                &fx.ctx,
                approved,
                &fx.approver,
                &mut fx.store,
                &fx.time,
                &mut events,
            )
            .unwrap();
        assert!(matches!(
            workflow.approve(
                &fx.ctx,
                approved,
                &fx.approver,
                &mut fx.store,
                &fx.time,
                &mut events,
            ),
            Err(FeeError::WaiverNotPending {
                status: WaiverStatus::Approved
            })
        ));

        let rejected = request(&mut fx, 10);
        workflow
            .reject(
                &fx.ctx,
                rejected,
                &fx.approver,
                &mut fx.store,
                &fx.time,
                &mut events,
            )
            .unwrap();
        assert!(matches!(
            workflow.approve(
                &fx.ctx,
                rejected,
                &fx.approver,
                &mut fx.store,
                &fx.time,
                &mut events,
            ),
            Err(FeeError::WaiverNotPending {
                status: WaiverStatus::Rejected
            })
        ));
    }

    #[test]
    fn test_rejection_leaves_fine_untouched() {
        let mut fx = fixture();
        let workflow = FineWaiverWorkflow::new();
        let mut events = EventStore::new();
        let waiver_id = request(&mut fx, 45);

        workflow
            .reject(
                &fx.ctx,
                waiver_id,
                &fx.approver,
                &mut fx.store,
                &fx.time,
                &mut events,
            )
            .unwrap();

        let assignment = fx.store.assignment(&fx.ctx, fx.assignment_id).unwrap();
        assert_eq!(assignment.amount_fine, Money::from_major(45));
    }
}
