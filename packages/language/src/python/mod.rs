//! The Python node catalog: kinds, builders, behaviour and code generation.

pub mod behaviour;
pub mod builders;
pub mod catalog;
pub mod codegen;
