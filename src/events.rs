use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{
    ApplicationId, AssignmentId, AssignmentStatus, BilledParty, StudentId, TransactionId, WaiverId,
    WaiverStatus,
};

/// all events emitted by the fee subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // assignment events
    FeeAssigned {
        assignment_id: AssignmentId,
        party: BilledParty,
        final_amount: Money,
        timestamp: DateTime<Utc>,
    },
    FeeAssignmentRemoved {
        assignment_id: AssignmentId,
        party: BilledParty,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PaymentRecorded {
        assignment_id: AssignmentId,
        transaction_id: TransactionId,
        amount: Money,
        reference_no: String,
        timestamp: DateTime<Utc>,
    },
    PaymentReverted {
        assignment_id: AssignmentId,
        transaction_id: TransactionId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },

    // advance credit events
    AdvanceRecorded {
        transaction_id: TransactionId,
        student_id: StudentId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    AdvanceApplied {
        source_transaction_id: TransactionId,
        assignment_id: AssignmentId,
        amount: Money,
        advance_remaining: Money,
        timestamp: DateTime<Utc>,
    },

    // admission events
    ProvisionalFeesAssigned {
        application_id: ApplicationId,
        assignment_ids: Vec<AssignmentId>,
        timestamp: DateTime<Utc>,
    },
    ProvisionalFeesMigrated {
        application_id: ApplicationId,
        student_id: StudentId,
        migrated: usize,
        timestamp: DateTime<Utc>,
    },

    // waiver events
    WaiverRequested {
        waiver_id: WaiverId,
        assignment_id: AssignmentId,
        waiver_amount: Money,
        timestamp: DateTime<Utc>,
    },
    WaiverDecided {
        waiver_id: WaiverId,
        assignment_id: AssignmentId,
        status: WaiverStatus,
        timestamp: DateTime<Utc>,
    },

    // status change events
    StatusChanged {
        assignment_id: AssignmentId,
        old_status: AssignmentStatus,
        new_status: AssignmentStatus,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
