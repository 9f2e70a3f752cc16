// hostgl/src/platform/mod.rs
//
//! Host driver backends.

pub mod software;
