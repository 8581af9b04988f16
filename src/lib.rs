// src/lib.rs

//! Taggle: bookmark sync, index reconciliation and faceted tag search

pub mod error;
pub mod models;
pub mod pipeline;
pub mod present;
pub mod query;
pub mod search;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod testing;
