#![allow(dead_code)]

pub mod fixtures;
pub mod workflows;

pub use fixtures::*;
pub use workflows::*;
