//! Tender Markup Engine
//!
//! Markup calculation for construction-tender cost estimation: turns the
//! direct cost of a bill-of-quantities line item into its quoted
//! (commercial) cost.
//!
//! # Architecture
//!
//! - **markup**: Calculation sequences, evaluation, validation, configuration
//!
//! # Critical Invariants
//!
//! 1. A step only reads results of steps before it (no cycles by construction)
//! 2. Calculation never fails; step errors are recorded and the step falls back
//! 3. Non-positive base amounts are returned unchanged
//! 4. The engine holds no state between calls

// Module declarations
pub mod markup;

// Re-exports for convenience
pub use markup::{
    calculate, validate, CalculationError, CalculationResult, Category, EvalError, MarkupConfig,
    MarkupPolicy, MarkupPolicyError, ParameterSet, Sequence, ValidationError,
};
