//! HTTP-backed implementations of the price and currency traits.

pub mod stooq;
pub mod util;
pub mod yahoo_finance;
