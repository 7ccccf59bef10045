pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod graph;
pub mod membership;
pub mod output;
pub mod pipeline;
pub mod primitive;
pub mod proteoforms;
pub mod queries;
pub mod relation;
pub mod store;
pub mod variants;
