pub mod aggregator;
pub mod ledger;
pub mod link;
pub mod sync;
pub mod token;
