//! Browsing a cube's fact view: request argument parsing and query execution.

mod browser;
mod query;
pub use browser::{fetch_one, fetch_rows, Browser};
pub use query::{parse_cuts, parse_drilldown, BrowseQuery, Cut, Order, Paging};
