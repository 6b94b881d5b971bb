//! Runtime module — process bootstrap helpers for the binary.

pub mod boot;
