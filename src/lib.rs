pub mod assignment;
pub mod catalog;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod payments;
pub mod state;
pub mod store;
pub mod types;
pub mod waiver;

// re-export key types
pub use decimal::{Money, Rate};
pub use errors::{FeeError, Result};
pub use events::{Event, EventStore};
pub use assignment::{
    AssignmentOutcome, FeeAssignmentEngine, FeePreview, FeeSelection, ProvisionalFeeManager,
    RosterPreviewRow, RosterStudent, StudentSelection,
};
pub use catalog::{FeeCatalog, FeeDiscount, FeeGroup, FeeType, PricingRow, Quote};
pub use payments::{
    AdvanceApplication, AdvancePaymentAllocator, FeeTransactionLedger, PaymentReceipt,
    PaymentRequest, RevertedPayment,
};
pub use state::{FeeAssignment, FeeTransaction, FineWaiver};
pub use store::FeeStore;
pub use types::{
    Actor, AssignmentStatus, BilledParty, BillingFrequency, BillingPeriod, DiscountKind,
    FinePolicy, PaymentMethod, RecordLifecycle, SyncState, TenantContext, WaiverStatus,
};
pub use waiver::FineWaiverWorkflow;

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
