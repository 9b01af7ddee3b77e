//! Foundational types: amounts, scope keys, the business calendar and
//! the open item store.

pub mod amount;
pub mod calendar;
pub mod item;
pub mod ledger_row;
pub mod scope;
pub mod store;
