//! earnings-watch — announcement-processing pipeline core.

pub mod analyze;
pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod retry;
pub mod router;
pub mod source;
pub mod store;
