pub mod ledger;
pub mod odds;
pub mod types;
