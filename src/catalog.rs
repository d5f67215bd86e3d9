use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{FeeError, Result};
use crate::types::{
    BillingFrequency, DiscountKind, FeeGroupId, FeeTypeId, FinePolicy, PricingRowId,
    RecordLifecycle, TenantId,
};

/// billable category with a billing frequency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeType {
    pub id: FeeTypeId,
    pub tenant_id: TenantId,
    pub name: String,
    pub code: String,
    pub frequency: BillingFrequency,
    pub lifecycle: RecordLifecycle,
}

impl FeeType {
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        code: impl Into<String>,
        frequency: BillingFrequency,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            code: code.into(),
            frequency,
            lifecycle: RecordLifecycle::Active,
        }
    }
}

/// named bundle of fee types billed together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeGroup {
    pub id: FeeGroupId,
    pub tenant_id: TenantId,
    pub name: String,
    /// system groups drive the student-specific monthly fee override
    pub is_system: bool,
    pub lifecycle: RecordLifecycle,
}

impl FeeGroup {
    pub fn new(tenant_id: TenantId, name: impl Into<String>, is_system: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            is_system,
            lifecycle: RecordLifecycle::Active,
        }
    }
}

/// fixed or percentage reduction with expiry and usage cap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeDiscount {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub name: String,
    pub kind: DiscountKind,
    pub expires_on: Option<NaiveDate>,
    pub is_recurring: bool,
    pub max_uses: Option<u32>,
    pub use_count: u32,
    pub lifecycle: RecordLifecycle,
}

impl FeeDiscount {
    pub fn new(tenant_id: TenantId, name: impl Into<String>, kind: DiscountKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            kind,
            expires_on: None,
            is_recurring: false,
            max_uses: None,
            use_count: 0,
            lifecycle: RecordLifecycle::Active,
        }
    }

    /// whether the discount may still be applied on the given day
    pub fn is_usable(&self, today: NaiveDate) -> bool {
        if !self.lifecycle.is_active() {
            return false;
        }
        if let Some(expiry) = self.expires_on {
            if today > expiry {
                return false;
            }
        }
        if let Some(cap) = self.max_uses {
            if self.use_count >= cap {
                return false;
            }
        }
        true
    }

    /// reduction on the given base amount, capped at the amount itself
    pub fn reduction_for(&self, amount: Money) -> Money {
        let reduction = match self.kind {
            DiscountKind::Fixed(value) => value,
            DiscountKind::Percentage(rate) => amount.portion(rate),
        };
        reduction.min(amount)
    }
}

/// pricing row: one (group, type) pair with amount, due date, fine policy and discount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRow {
    pub id: PricingRowId,
    pub tenant_id: TenantId,
    pub group_id: FeeGroupId,
    pub fee_type_id: FeeTypeId,
    pub amount: Money,
    pub due_date: Option<NaiveDate>,
    pub fine_policy: FinePolicy,
    pub discount_id: Option<Uuid>,
    pub lifecycle: RecordLifecycle,
}

/// priced quote for one row: base amount with computed discount and fine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub amount: Money,
    pub discount: Money,
    pub fine: Money,
}

impl Quote {
    pub fn final_amount(&self) -> Money {
        self.amount - self.discount
    }
}

/// static pricing configuration for one tenant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeCatalog {
    fee_types: HashMap<FeeTypeId, FeeType>,
    groups: HashMap<FeeGroupId, FeeGroup>,
    rows: HashMap<PricingRowId, PricingRow>,
    discounts: HashMap<Uuid, FeeDiscount>,
}

impl FeeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_fee_type(&mut self, fee_type: FeeType) -> FeeTypeId {
        let id = fee_type.id;
        self.fee_types.insert(id, fee_type);
        id
    }

    pub fn add_group(&mut self, group: FeeGroup) -> FeeGroupId {
        let id = group.id;
        self.groups.insert(id, group);
        id
    }

    pub fn add_discount(&mut self, discount: FeeDiscount) -> Uuid {
        let id = discount.id;
        self.discounts.insert(id, discount);
        id
    }

    /// add a pricing row; (group, type) must be unique among active rows
    pub fn add_pricing_row(
        &mut self,
        group_id: FeeGroupId,
        fee_type_id: FeeTypeId,
        amount: Money,
        due_date: Option<NaiveDate>,
        fine_policy: FinePolicy,
        discount_id: Option<Uuid>,
    ) -> Result<PricingRowId> {
        let group = self
            .groups
            .get(&group_id)
            .ok_or(FeeError::FeeGroupNotFound { id: group_id })?;
        if !self.fee_types.contains_key(&fee_type_id) {
            return Err(FeeError::FeeTypeNotFound { id: fee_type_id });
        }
        if self.active_row_exists(group_id, fee_type_id) {
            return Err(FeeError::DuplicatePricingRow {
                group_id,
                fee_type_id,
            });
        }

        let row = PricingRow {
            id: Uuid::new_v4(),
            tenant_id: group.tenant_id,
            group_id,
            fee_type_id,
            amount,
            due_date,
            fine_policy,
            discount_id,
            lifecycle: RecordLifecycle::Active,
        };
        let id = row.id;
        self.rows.insert(id, row);
        Ok(id)
    }

    /// soft-delete a pricing row; the row stays revivable
    pub fn retire_pricing_row(&mut self, row_id: PricingRowId) -> Result<()> {
        let row = self
            .rows
            .get_mut(&row_id)
            .ok_or(FeeError::PricingRowNotFound { id: row_id })?;
        row.lifecycle = RecordLifecycle::Deleted;
        Ok(())
    }

    /// revive a soft-deleted pricing row if its (group, type) slot is still free
    pub fn revive_pricing_row(&mut self, row_id: PricingRowId) -> Result<()> {
        let (group_id, fee_type_id) = {
            let row = self
                .rows
                .get(&row_id)
                .ok_or(FeeError::PricingRowNotFound { id: row_id })?;
            (row.group_id, row.fee_type_id)
        };
        if self.active_row_exists(group_id, fee_type_id) {
            return Err(FeeError::DuplicatePricingRow {
                group_id,
                fee_type_id,
            });
        }
        if let Some(row) = self.rows.get_mut(&row_id) {
            row.lifecycle = RecordLifecycle::Active;
        }
        Ok(())
    }

    /// soft-delete a fee type; hard removal is never offered while assignments reference it
    pub fn retire_fee_type(&mut self, fee_type_id: FeeTypeId) -> Result<()> {
        let fee_type = self
            .fee_types
            .get_mut(&fee_type_id)
            .ok_or(FeeError::FeeTypeNotFound { id: fee_type_id })?;
        fee_type.lifecycle = RecordLifecycle::Deleted;
        Ok(())
    }

    pub fn fee_type(&self, id: FeeTypeId) -> Result<&FeeType> {
        self.fee_types
            .get(&id)
            .ok_or(FeeError::FeeTypeNotFound { id })
    }

    pub fn group(&self, id: FeeGroupId) -> Result<&FeeGroup> {
        self.groups.get(&id).ok_or(FeeError::FeeGroupNotFound { id })
    }

    pub fn row(&self, id: PricingRowId) -> Result<&PricingRow> {
        self.rows.get(&id).ok_or(FeeError::PricingRowNotFound { id })
    }

    pub fn discount(&self, id: Uuid) -> Option<&FeeDiscount> {
        self.discounts.get(&id)
    }

    /// active rows matching any of the selected groups and fee types
    pub fn rows_for_selection(
        &self,
        group_ids: &[FeeGroupId],
        fee_type_ids: &[FeeTypeId],
    ) -> Vec<&PricingRow> {
        let mut rows: Vec<&PricingRow> = self
            .rows
            .values()
            .filter(|row| {
                row.lifecycle.is_active()
                    && group_ids.contains(&row.group_id)
                    && fee_type_ids.contains(&row.fee_type_id)
            })
            .collect();
        rows.sort_by_key(|row| row.id);
        rows
    }

    /// active rows belonging to one group
    pub fn rows_for_group(&self, group_id: FeeGroupId) -> Vec<&PricingRow> {
        let mut rows: Vec<&PricingRow> = self
            .rows
            .values()
            .filter(|row| row.lifecycle.is_active() && row.group_id == group_id)
            .collect();
        rows.sort_by_key(|row| row.id);
        rows
    }

    /// price one row: discount net of expiry/usage caps, fine per the row policy
    pub fn quote(&self, row: &PricingRow, base_amount: Money, today: NaiveDate) -> Quote {
        let discount = row
            .discount_id
            .and_then(|id| self.discounts.get(&id))
            .filter(|d| d.is_usable(today))
            .map(|d| d.reduction_for(base_amount))
            .unwrap_or(Money::ZERO);

        Quote {
            amount: base_amount,
            discount,
            fine: row.fine_policy.fine_for(base_amount),
        }
    }

    /// bump the usage counter after a discount has been applied
    pub fn record_discount_use(&mut self, discount_id: Uuid) {
        if let Some(discount) = self.discounts.get_mut(&discount_id) {
            discount.use_count += 1;
        }
    }

    fn active_row_exists(&self, group_id: FeeGroupId, fee_type_id: FeeTypeId) -> bool {
        self.rows.values().any(|row| {
            row.lifecycle.is_active()
                && row.group_id == group_id
                && row.fee_type_id == fee_type_id
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()
    }

    fn catalog_with_row(
        fine_policy: FinePolicy,
        discount: Option<FeeDiscount>,
    ) -> (FeeCatalog, PricingRowId) {
        let tenant = Uuid::new_v4();
        let mut catalog = FeeCatalog::new();
        let group = catalog.add_group(FeeGroup::new(tenant, "Tuition", true));
        let fee_type = catalog.add_fee_type(FeeType::new(
            tenant,
            "Tuition Fee",
            "TUI",
            BillingFrequency::Monthly,
        ));
        let discount_id = discount.map(|d| catalog.add_discount(d));
        let row = catalog
            .add_pricing_row(
                group,
                fee_type,
                Money::from_major(1_000),
                None,
                fine_policy,
                discount_id,
            )
            .unwrap();
        (catalog, row)
    }

    #[test]
    fn test_quote_with_percentage_discount_and_fine() {
        let discount = FeeDiscount::new(
            Uuid::new_v4(),
            "Sibling",
            DiscountKind::Percentage(Rate::from_percentage(10)),
        );
        let (catalog, row_id) = catalog_with_row(
            FinePolicy::Percentage(Rate::from_percentage(5)),
            Some(discount),
        );

        let row = catalog.row(row_id).unwrap();
        let quote = catalog.quote(row, row.amount, today());

        assert_eq!(quote.amount, Money::from_major(1_000));
        assert_eq!(quote.discount, Money::from_major(100));
        assert_eq!(quote.fine, Money::from_major(50));
        assert_eq!(quote.final_amount(), Money::from_major(900));
    }

    #[test]
    fn test_expired_discount_yields_no_reduction() {
        let mut discount = FeeDiscount::new(
            Uuid::new_v4(),
            "Early bird",
            DiscountKind::Fixed(Money::from_major(200)),
        );
        discount.expires_on = Some(NaiveDate::from_ymd_opt(2026, 3, 31).unwrap());
        let (catalog, row_id) = catalog_with_row(FinePolicy::None, Some(discount));

        let row = catalog.row(row_id).unwrap();
        let quote = catalog.quote(row, row.amount, today());
        assert_eq!(quote.discount, Money::ZERO);
        assert_eq!(quote.final_amount(), Money::from_major(1_000));
    }

    #[test]
    fn test_use_capped_discount() {
        let mut discount = FeeDiscount::new(
            Uuid::new_v4(),
            "Scholarship",
            DiscountKind::Fixed(Money::from_major(100)),
        );
        discount.max_uses = Some(1);
        let discount_id = discount.id;
        let (mut catalog, row_id) = catalog_with_row(FinePolicy::None, Some(discount));

        let row = catalog.row(row_id).unwrap().clone();
        assert_eq!(
            catalog.quote(&row, row.amount, today()).discount,
            Money::from_major(100)
        );

        catalog.record_discount_use(discount_id);
        assert_eq!(catalog.quote(&row, row.amount, today()).discount, Money::ZERO);
    }

    #[test]
    fn test_fixed_discount_capped_at_amount() {
        let discount = FeeDiscount::new(
            Uuid::new_v4(),
            "Full waiver",
            DiscountKind::Fixed(Money::from_major(5_000)),
        );
        let (catalog, row_id) = catalog_with_row(FinePolicy::None, Some(discount));

        let row = catalog.row(row_id).unwrap();
        let quote = catalog.quote(row, row.amount, today());
        assert_eq!(quote.discount, Money::from_major(1_000));
        assert_eq!(quote.final_amount(), Money::ZERO);
    }

    #[test]
    fn test_duplicate_row_rejected_until_retired() {
        let (mut catalog, row_id) = catalog_with_row(FinePolicy::None, None);
        let row = catalog.row(row_id).unwrap().clone();

        let duplicate = catalog.add_pricing_row(
            row.group_id,
            row.fee_type_id,
            Money::from_major(500),
            None,
            FinePolicy::None,
            None,
        );
        assert!(matches!(
            duplicate,
            Err(FeeError::DuplicatePricingRow { .. })
        ));

        catalog.retire_pricing_row(row_id).unwrap();
        assert!(catalog
            .add_pricing_row(
                row.group_id,
                row.fee_type_id,
                Money::from_major(500),
                None,
                FinePolicy::None,
                None,
            )
            .is_ok());

        // the slot is taken again, so the retired row cannot come back
        assert!(matches!(
            catalog.revive_pricing_row(row_id),
            Err(FeeError::DuplicatePricingRow { .. })
        ));
    }
}
