//! Ledger implementations and database utilities
//
// Ledger contract and error type
pub mod ledger;
//
// PostgreSQL-backed ledger
pub mod postgres;
//
// In-memory ledger
pub mod memory;
//
// Pool setup and migrations
pub mod pool;
//
// Transaction utilities
pub mod transaction;

pub use ledger::{check_transition, LedgerError, ProgressLedger};
pub use memory::InMemoryProgressLedger;
pub use pool::connect;
pub use postgres::PgProgressLedger;
