#![forbid(unsafe_code)]

pub mod access;
pub mod api;
pub mod app;
pub mod backend;
pub mod challenge;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod credential;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod ledger;
pub mod observability;
pub mod runtime;
