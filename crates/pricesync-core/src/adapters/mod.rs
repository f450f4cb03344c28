//! Quote provider adapters.

pub mod yahoo;

pub use yahoo::YahooQuoteSource;
