pub mod certificate;
pub mod config;
pub mod ero;
pub mod handlers;
pub mod humanize;
pub mod ledger;
pub mod messaging;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod render;
pub mod server;
pub mod storage;
pub mod validation;
