pub mod client;
mod record;
mod transaction;

pub use transaction::DbTransaction;
