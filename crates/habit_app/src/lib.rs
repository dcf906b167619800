pub mod adapters;
pub mod app;
pub mod cli;
pub mod store;
