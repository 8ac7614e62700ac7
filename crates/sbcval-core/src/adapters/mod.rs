mod synthetic;
mod yahoo;

pub use synthetic::SyntheticMarketData;
pub use yahoo::{YahooAdapter, YahooConfig, DEFAULT_BASE_URL};
