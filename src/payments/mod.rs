pub mod advance;
pub mod ledger;

pub use advance::{AdvanceApplication, AdvanceConsumption, AdvancePaymentAllocator};
pub use ledger::{
    FeeTransactionLedger, PaymentReceipt, PaymentRequest, RevertedPayment,
    DUPLICATE_GUARD_SECONDS,
};
