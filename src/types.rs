use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::errors::{FeeError, Result};

pub type TenantId = Uuid;
pub type StudentId = Uuid;
pub type ApplicationId = Uuid;
pub type FeeTypeId = Uuid;
pub type FeeGroupId = Uuid;
pub type PricingRowId = Uuid;
pub type AssignmentId = Uuid;
pub type TransactionId = Uuid;
pub type WaiverId = Uuid;

/// billing frequency of a fee type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingFrequency {
    OneTime,
    Monthly,
    Quarterly,
    HalfYearly,
    Annual,
}

impl BillingFrequency {
    pub fn is_recurring(&self) -> bool {
        !matches!(self, BillingFrequency::OneTime)
    }
}

/// late-payment fine policy on a pricing row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinePolicy {
    None,
    Fixed(Money),
    Percentage(Rate),
}

impl FinePolicy {
    /// fine owed on the given base amount once overdue
    pub fn fine_for(&self, amount: Money) -> Money {
        match self {
            FinePolicy::None => Money::ZERO,
            FinePolicy::Fixed(fine) => *fine,
            FinePolicy::Percentage(rate) => amount.portion(*rate),
        }
    }
}

/// discount reduction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountKind {
    Fixed(Money),
    Percentage(Rate),
}

/// derived settlement status of a fee assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentStatus {
    /// nothing paid yet
    Pending,
    /// partially settled
    Partial,
    /// fully settled
    Paid,
}

/// fine waiver lifecycle; Approved and Rejected are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaiverStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    Cheque,
    BankTransfer,
    Card,
    Online,
}

/// record lifecycle replacing free-form soft-delete flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordLifecycle {
    Active,
    Deleted,
}

impl RecordLifecycle {
    pub fn is_active(&self) -> bool {
        matches!(self, RecordLifecycle::Active)
    }
}

/// downstream synchronization state, separate from lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    Synced,
    Dirty,
}

/// acting user threaded into every mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub display_name: String,
}

impl Actor {
    pub fn new(id: Uuid, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// caller's tenant and active academic session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    pub session_id: Uuid,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId, session_id: Uuid) -> Self {
        Self {
            tenant_id,
            session_id,
        }
    }

    /// reject a cross-tenant reference
    pub fn check(&self, entity_tenant: TenantId) -> Result<()> {
        if entity_tenant != self.tenant_id {
            return Err(FeeError::TenantMismatch {
                entity_tenant,
                caller_tenant: self.tenant_id,
            });
        }
        Ok(())
    }
}

/// billing period one assignment belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub month: u32,
    pub year: i32,
}

impl BillingPeriod {
    pub fn new(month: u32, year: i32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(FeeError::InvalidBillingPeriod { month });
        }
        Ok(Self { month, year })
    }

    /// fallback due date when the catalog row carries none: the 12th of the period month
    pub fn default_due_date(&self) -> NaiveDate {
        // month is validated at construction; the 12th exists in every month
        NaiveDate::from_ymd_opt(self.year, self.month, 12).unwrap_or(NaiveDate::MIN)
    }
}

/// the party a fee assignment bills: an enrolled student or a pre-admission applicant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BilledParty {
    Student(StudentId),
    Applicant(ApplicationId),
}

impl BilledParty {
    pub fn student_id(&self) -> Option<StudentId> {
        match self {
            BilledParty::Student(id) => Some(*id),
            BilledParty::Applicant(_) => None,
        }
    }

    pub fn application_id(&self) -> Option<ApplicationId> {
        match self {
            BilledParty::Applicant(id) => Some(*id),
            BilledParty::Student(_) => None,
        }
    }
}
