// Allow dead code for items that are part of the public API but only used in tests
#![allow(dead_code)]

pub mod error;
pub mod export;
pub mod progress;
pub mod schema;
pub mod sheet;
pub mod source;
