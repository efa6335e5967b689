pub mod business_partners;
pub mod company;
pub mod customers;
pub mod general_ledger;
pub mod reports;
pub mod sales_orders;
