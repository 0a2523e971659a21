//! Finance: charges owed by units, collections against them, and the settings that drive
//! the recurring dues billing.

mod collection;
mod debt;
mod endpoints;
mod settings;
mod summary;

pub use collection::{
    Collection, NewCollection, PaymentMethod, UnitPayment, cancel_collection,
    create_collection_table, get_unit_payments, record_collection,
};
pub use debt::{
    ChargeTarget, Debt, DebtId, DebtKind, DebtListing, DebtStatus, NewCharge, bulk_delete_debts,
    charge_active_units, create_debt, create_debt_table, delete_debt, get_debt, get_debt_listing,
    get_open_unit_debts,
};
pub use endpoints::{
    bulk_delete_debts_endpoint, cancel_collection_endpoint, create_charge_endpoint,
    delete_debt_endpoint, get_debts_endpoint, get_finance_settings_endpoint,
    get_finance_summary_endpoint, get_unit_debts_endpoint, get_unit_payments_endpoint,
    record_collection_endpoint, update_finance_settings_endpoint,
};
pub use settings::{
    FinanceSettings, FinanceSettingsForm, create_finance_settings_table, get_finance_settings,
    update_finance_settings,
};
pub use summary::{FinanceSummary, get_finance_summary};
