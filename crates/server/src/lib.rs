//! HTTP serving for the iris species predictor

pub mod api;
pub mod bootstrap;
pub mod config;
