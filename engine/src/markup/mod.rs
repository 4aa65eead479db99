// Markup calculation engine
//
// Turns a line item's direct cost into its commercial cost through a
// configurable, per-category sequence of arithmetic steps.
//
// Architecture:
// - types.rs: Sequence, Step, Operation, Operand, Category
// - interpreter.rs: Operand resolution, percentage arithmetic, step evaluation
// - calculator.rs: Sequence evaluation over the memo table of step results
// - validation.rs: Static backward-reference checks
// - policy.rs: JSON configuration loading (MarkupPolicy)
// - batch.rs: Parallel evaluation of line item batches

pub mod batch;
pub mod calculator;
pub mod interpreter;
pub mod policy;
pub mod types;
pub mod validation;

// Re-export main types for convenience
pub use batch::{totals_by_category, LineItemCosts, LineItemMarkup};
pub use calculator::{
    calculate, calculate_from_value, trace, CalculationError, CalculationResult, StepTrace,
};
pub use interpreter::{
    apply_operation, evaluate_step, resolve_operand, resolve_step_base, EvalError, StepOutcome,
};
pub use policy::{CategoryValidationError, MarkupConfig, MarkupPolicy, MarkupPolicyError};
pub use types::{
    Action, Category, MultiplyFormat, Operand, Operation, ParameterSet, Sequence, Step, StepRef,
};
pub use validation::{is_valid, validate, ValidationError};
