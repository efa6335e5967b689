pub mod business_partner;
pub mod ledger;
pub mod product;
pub mod report;
pub mod sales_order;
pub mod setting;
