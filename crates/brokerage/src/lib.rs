//! EasyEquities brokerage client.
//!
//! Logs in to the EasyEquities web platform with a cookie-backed session and
//! reads accounts, valuations, holdings, transactions, and price history.
//! Holdings and accounts are only available as rendered HTML and are scraped.

pub mod client;
pub mod parse;

pub use client::{BrokerageConfig, EasyEquitiesClient};
