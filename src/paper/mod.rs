//! Simulated exchange for dry runs and integration tests

mod exchange;
mod order;

pub use exchange::{Book, PaperExchange};
pub use order::PaperOrder;
