pub mod aggregates;
pub mod error;
pub mod filter;
pub mod loader;
pub mod schema;
pub mod store;

pub use error::{DatasetError, Result};
pub use filter::FilterSelection;
pub use loader::{load_transactions, LoadOutcome, LoadReport};
pub use store::DatasetStore;

#[cfg(test)]
mod tests;
