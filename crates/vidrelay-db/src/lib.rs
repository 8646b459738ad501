//! vidrelay progress ledger
//!
//! The ledger is the authoritative per-asset state machine. It ships a PostgreSQL
//! implementation for production and an in-memory one for tests and local runs.

pub mod db;

pub use db::{
    check_transition, connect, InMemoryProgressLedger, LedgerError, PgProgressLedger,
    ProgressLedger,
};
