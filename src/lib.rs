// Allow dead code for items that are part of the public API but only used in tests
#![allow(dead_code)]

pub mod clone;
pub mod config;
pub mod db;
pub mod pipeline;
pub mod processor;
pub mod progress;
pub mod repair;
pub mod spec;
pub mod transform;
