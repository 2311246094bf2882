//! Business logic services

pub mod import;
pub mod review;
pub mod study;
pub mod sync;
