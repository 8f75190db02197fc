#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

pub mod aggregate;
pub mod classify;
pub mod cohort;
pub mod config;
pub mod data;
pub mod engine;
pub mod loss;
pub mod report;
pub mod resolve;
pub mod reweight;
pub mod summary;
