pub mod app;
pub mod config;
pub mod domain;
pub mod download;
pub mod error;
mod http;
pub mod output;
pub mod pdbe;
pub mod pipeline;
pub mod rcsb;
pub mod select;
pub mod store;
pub mod table;
