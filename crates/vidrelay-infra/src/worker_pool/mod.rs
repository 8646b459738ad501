//! Worker pool clients

mod http;

pub use http::HttpWorkerPool;
