//! Style Module - class-name composition for component markup.

mod class_builder;

pub use class_builder::*;
