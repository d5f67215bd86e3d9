use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::WaiverStatus;

#[derive(Error, Debug)]
pub enum FeeError {
    #[error("fee assignment not found: {id}")]
    InvalidAssignment {
        id: Uuid,
    },

    #[error("duplicate transaction: {amount} already recorded against {assignment_id} within the guard window")]
    DuplicateTransaction {
        assignment_id: Uuid,
        amount: Money,
    },

    #[error("overpayment: remaining due {remaining}, provided {provided}")]
    Overpayment {
        remaining: Money,
        provided: Money,
    },

    #[error("partial payment not allowed: remaining due {remaining}, provided {provided}")]
    PartialPaymentNotAllowed {
        remaining: Money,
        provided: Money,
    },

    #[error("waiver not pending: current status is {status:?}")]
    WaiverNotPending {
        status: WaiverStatus,
    },

    #[error("waiver amount {requested} exceeds standing fine {fine}")]
    WaiverExceedsFine {
        requested: Money,
        fine: Money,
    },

    #[error("cross-tenant reference: entity belongs to {entity_tenant}, caller is {caller_tenant}")]
    TenantMismatch {
        entity_tenant: Uuid,
        caller_tenant: Uuid,
    },

    #[error("invalid payment amount: {amount}")]
    InvalidPaymentAmount {
        amount: Money,
    },

    #[error("fee type not found: {id}")]
    FeeTypeNotFound {
        id: Uuid,
    },

    #[error("fee group not found: {id}")]
    FeeGroupNotFound {
        id: Uuid,
    },

    #[error("pricing row not found: {id}")]
    PricingRowNotFound {
        id: Uuid,
    },

    #[error("duplicate pricing row for group {group_id} and type {fee_type_id}")]
    DuplicatePricingRow {
        group_id: Uuid,
        fee_type_id: Uuid,
    },

    #[error("recurring fee type {id} cannot be provisionally assigned")]
    RecurringFeeNotProvisional {
        id: Uuid,
    },

    #[error("waiver not found: {id}")]
    WaiverNotFound {
        id: Uuid,
    },

    #[error("invalid billing period: month {month}")]
    InvalidBillingPeriod {
        month: u32,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, FeeError>;
