// Markup Engine - Step Interpreter
//
// Resolves operands, applies percentage/literal arithmetic, and evaluates a
// single step against the memo table of earlier step results.

use crate::markup::types::{Action, MultiplyFormat, Operand, Operation, ParameterSet, Step, StepRef};
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while evaluating one step
#[derive(Debug, Clone, Error, PartialEq, Serialize)]
pub enum EvalError {
    #[error("Parameter not found: {0}")]
    MissingParameter(String),

    #[error("Step result reference {index} is out of range ({available} earlier results)")]
    InvalidStepReference { index: usize, available: usize },

    #[error("Base index {index} is out of range ({available} earlier results)")]
    InvalidBaseIndex { index: usize, available: usize },

    #[error("Literal operand has no value")]
    MissingLiteral,

    #[error("Division by zero in operation")]
    DivisionByZero,

    #[error("Step has no operations")]
    MissingOperation,
}

// ============================================================================
// OPERAND RESOLUTION
// ============================================================================

/// Resolve an operand to a number
///
/// # Arguments
///
/// * `operand` - Operand to resolve
/// * `parameters` - Named percentage parameters
/// * `prior_results` - Results of the steps before the current one
/// * `base_amount` - Category base amount
///
/// # Example
///
/// ```rust
/// use tender_markup_engine::markup::{resolve_operand, Operand, ParameterSet};
///
/// let mut params = ParameterSet::new();
/// params.insert("overhead".to_string(), 15.0);
///
/// let value = resolve_operand(&Operand::parameter("overhead"), &params, &[], 1000.0).unwrap();
/// assert_eq!(value, 15.0);
///
/// let base = resolve_operand(&Operand::Base, &params, &[], 1000.0).unwrap();
/// assert_eq!(base, 1000.0);
/// ```
pub fn resolve_operand(
    operand: &Operand,
    parameters: &ParameterSet,
    prior_results: &[f64],
    base_amount: f64,
) -> Result<f64, EvalError> {
    match operand {
        Operand::Base => Ok(base_amount),

        Operand::StepResult { index } => {
            prior_results
                .get(*index)
                .copied()
                .ok_or(EvalError::InvalidStepReference {
                    index: *index,
                    available: prior_results.len(),
                })
        }

        Operand::Parameter { name } => parameters
            .get(name)
            .copied()
            .ok_or_else(|| EvalError::MissingParameter(name.clone())),

        Operand::Literal { value } => value.ok_or(EvalError::MissingLiteral),
    }
}

/// Resolve a step's base value from its base reference
pub fn resolve_step_base(
    base_index: StepRef,
    prior_results: &[f64],
    base_amount: f64,
) -> Result<f64, EvalError> {
    match base_index {
        StepRef::Base => Ok(base_amount),
        StepRef::Step(index) => {
            prior_results
                .get(index)
                .copied()
                .ok_or(EvalError::InvalidBaseIndex {
                    index,
                    available: prior_results.len(),
                })
        }
    }
}

// ============================================================================
// ARITHMETIC
// ============================================================================

/// Apply one operation to the running value
///
/// The same action means different arithmetic depending on the operand:
///
/// | action   | parameter operand `p`                        | other operand `v` |
/// |----------|----------------------------------------------|-------------------|
/// | multiply | `x * (1 + p/100)` (addOne), `x * p/100` (direct) | `x * v`       |
/// | divide   | `x / (1 + p/100)` (addOne), `x / (p/100)` (direct) | `x / v`     |
///
/// Dividing by an operand that resolves to 0 fails for every operand kind and
/// format, as does a parameter whose effective divisor is 0 (`-100` under addOne).
/// | add      | `x + x * p/100`                              | `x + v`           |
/// | subtract | `x - x * p/100`                              | `x - v`           |
///
/// # Example
///
/// ```rust
/// use tender_markup_engine::markup::{apply_operation, Action, MultiplyFormat, Operand, Operation};
///
/// let markup = Operation::new(Action::Multiply, Operand::parameter("x"));
/// assert_eq!(apply_operation(100.0, &markup, 10.0).unwrap(), 110.0);
///
/// let share = markup.with_format(MultiplyFormat::Direct);
/// assert_eq!(apply_operation(100.0, &share, 10.0).unwrap(), 10.0);
/// ```
pub fn apply_operation(
    running: f64,
    operation: &Operation,
    operand_value: f64,
) -> Result<f64, EvalError> {
    if operation.action == Action::Divide && operand_value == 0.0 {
        return Err(EvalError::DivisionByZero);
    }

    if !operation.operand.is_parameter() {
        return match operation.action {
            Action::Multiply => Ok(running * operand_value),
            Action::Divide => checked_div(running, operand_value),
            Action::Add => Ok(running + operand_value),
            Action::Subtract => Ok(running - operand_value),
        };
    }

    // Scale by hundredths last so whole-number amounts stay exact
    let percent = match operation.multiply_format {
        MultiplyFormat::AddOne => 100.0 + operand_value,
        MultiplyFormat::Direct => operand_value,
    };

    match operation.action {
        Action::Multiply => Ok(running * percent / 100.0),
        Action::Divide => checked_div(running * 100.0, percent),
        // Percentage of the running value, not a flat increment
        Action::Add => Ok(running + running * operand_value / 100.0),
        Action::Subtract => Ok(running - running * operand_value / 100.0),
    }
}

fn checked_div(numerator: f64, divisor: f64) -> Result<f64, EvalError> {
    if divisor == 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    Ok(numerator / divisor)
}

// ============================================================================
// STEP EVALUATION
// ============================================================================

/// Outcome of evaluating one step
///
/// `value` is always usable: on failure it holds the fallback value (the
/// running value before the failing operation, or the step's base value).
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub value: f64,
    pub error: Option<EvalError>,
}

impl StepOutcome {
    fn ok(value: f64) -> Self {
        Self { value, error: None }
    }

    fn fallback(value: f64, error: EvalError) -> Self {
        Self {
            value,
            error: Some(error),
        }
    }
}

/// Evaluate a single step
///
/// Never fails: a resolution or arithmetic error stops the step's remaining
/// operations and the step keeps the value computed so far. An unresolvable
/// base index falls back to `base_amount`.
pub fn evaluate_step(
    step: &Step,
    base_amount: f64,
    prior_results: &[f64],
    parameters: &ParameterSet,
) -> StepOutcome {
    let step_base = match resolve_step_base(step.base_index, prior_results, base_amount) {
        Ok(value) => value,
        Err(e) => return StepOutcome::fallback(base_amount, e),
    };

    if step.operations.is_empty() {
        return StepOutcome::fallback(step_base, EvalError::MissingOperation);
    }

    let mut running = step_base;
    for operation in &step.operations {
        let applied = resolve_operand(&operation.operand, parameters, prior_results, base_amount)
            .and_then(|operand_value| apply_operation(running, operation, operand_value));

        match applied {
            Ok(value) => running = value,
            Err(e) => return StepOutcome::fallback(running, e),
        }
    }

    StepOutcome::ok(running)
}

// ============================================================================
// TESTS
// ============================================================================
