//! Paper brokerage: the capital ledger and the limit order book.

mod ledger;
mod order_book;

pub use ledger::{Ledger, LedgerSnapshot, OpenRequest};
pub use order_book::OrderBook;
