pub mod config;
pub mod error;
pub mod fetch;
pub mod input;
pub mod optimizer;
pub mod output;
pub mod pipeline;
pub mod weather;
