//! Generic Mamdani fuzzy inference, parameterised per domain by a
//! `FuzzySystemConfig` (variables + rule base as data).

pub mod defuzz;
pub mod membership;
pub mod system;

pub use membership::Triangle;
pub use system::{
    FuzzyError, FuzzySystem, FuzzySystemConfig, FuzzyVariable, Inference, RuleConfig, Signal,
    VariableConfig,
};
