// Markup Engine - Sequence Calculator
//
// Drives step evaluation over a whole sequence. Earlier results are kept in
// an append-only memo table; a step only ever reads entries before its own
// position, so evaluation order is the sequence order.

use crate::markup::interpreter::{evaluate_step, EvalError};
use crate::markup::types::{ParameterSet, Sequence};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Diagnostics recorded while calculating a sequence
///
/// None of these abort the calculation.
#[derive(Debug, Clone, Error, PartialEq, Serialize)]
pub enum CalculationError {
    #[error("Malformed sequence: {0}")]
    MalformedSequence(String),

    #[error("Base amount {0} is negative; markup not applied")]
    NegativeBaseAmount(f64),

    #[error("Base amount is not a finite number")]
    NonFiniteBaseAmount,

    /// `position` is 1-based
    #[error("Step {position}: {source}")]
    Step { position: usize, source: EvalError },
}

/// Result of a sequence calculation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationResult {
    /// Base (direct) cost the calculation started from
    pub base_amount: f64,

    /// Commercial cost
    pub result: f64,

    /// One entry per evaluated step
    pub per_step_results: Vec<f64>,

    pub errors: Vec<CalculationError>,
}

impl CalculationResult {
    fn unchanged(base_amount: f64, errors: Vec<CalculationError>) -> Self {
        Self {
            base_amount,
            result: base_amount,
            per_step_results: Vec::new(),
            errors,
        }
    }

    /// Effective markup over the base amount, in percent
    ///
    /// Reporting only. `None` when the base amount is zero.
    pub fn markup_percent(&self) -> Option<f64> {
        if self.base_amount == 0.0 {
            return None;
        }
        Some((self.result - self.base_amount) / self.base_amount * 100.0)
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Diagnostics rendered for display
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Step-by-step display row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTrace {
    pub position: usize,
    pub label: String,
    pub value: f64,
}

/// Calculate the commercial cost of `base_amount` through `sequence`
///
/// Never fails. Step-level failures are recorded in `errors` and the failing
/// step keeps its fallback value, so later steps still compute. Non-positive
/// base amounts are returned unchanged without evaluating any step.
///
/// # Example
///
/// ```rust
/// use tender_markup_engine::markup::{
///     calculate, Action, Operand, Operation, ParameterSet, Sequence, Step, StepRef,
/// };
///
/// let sequence = Sequence::new(vec![
///     Step::new(StepRef::Base, vec![Operation::new(Action::Multiply, Operand::parameter("overhead"))]),
///     Step::new(StepRef::Step(0), vec![Operation::new(Action::Add, Operand::literal(500.0))]),
/// ]);
/// let mut params = ParameterSet::new();
/// params.insert("overhead".to_string(), 15.0);
///
/// let calc = calculate(&sequence, 1000.0, &params);
/// assert_eq!(calc.result, 1650.0);
/// assert_eq!(calc.per_step_results, vec![1150.0, 1650.0]);
/// assert!(calc.is_clean());
/// ```
pub fn calculate(
    sequence: &Sequence,
    base_amount: f64,
    parameters: &ParameterSet,
) -> CalculationResult {
    if sequence.is_empty() {
        warn!("calculation requested for an empty sequence");
        return CalculationResult::unchanged(
            base_amount,
            vec![CalculationError::MalformedSequence(
                "sequence has no steps".to_string(),
            )],
        );
    }

    if !base_amount.is_finite() {
        warn!(base_amount, "non-finite base amount, markup not applied");
        return CalculationResult::unchanged(
            base_amount,
            vec![CalculationError::NonFiniteBaseAmount],
        );
    }

    if base_amount <= 0.0 {
        let errors = if base_amount < 0.0 {
            vec![CalculationError::NegativeBaseAmount(base_amount)]
        } else {
            Vec::new()
        };
        return CalculationResult::unchanged(base_amount, errors);
    }

    let mut per_step_results = Vec::with_capacity(sequence.len());
    let mut errors = Vec::new();

    for (index, step) in sequence.steps().iter().enumerate() {
        let position = index + 1;
        let outcome = evaluate_step(step, base_amount, &per_step_results, parameters);

        if let Some(source) = outcome.error {
            warn!(position, fallback = outcome.value, error = %source, "step fell back");
            errors.push(CalculationError::Step { position, source });
        } else {
            debug!(position, label = %step.label(position), value = outcome.value, "step evaluated");
        }

        per_step_results.push(outcome.value);
    }

    let result = per_step_results.last().copied().unwrap_or(base_amount);

    CalculationResult {
        base_amount,
        result,
        per_step_results,
        errors,
    }
}

/// Calculate from a raw stored sequence
///
/// Anything that is not a list of well-formed steps yields a
/// `MalformedSequence` result equal to `base_amount`.
pub fn calculate_from_value(
    raw_sequence: &serde_json::Value,
    base_amount: f64,
    parameters: &ParameterSet,
) -> CalculationResult {
    if !raw_sequence.is_array() {
        warn!("stored sequence is not a list");
        return CalculationResult::unchanged(
            base_amount,
            vec![CalculationError::MalformedSequence(format!(
                "expected a list of steps, found {}",
                json_kind(raw_sequence)
            ))],
        );
    }

    match Sequence::deserialize(raw_sequence) {
        Ok(sequence) => calculate(&sequence, base_amount, parameters),
        Err(e) => {
            warn!(error = %e, "stored sequence could not be parsed");
            CalculationResult::unchanged(
                base_amount,
                vec![CalculationError::MalformedSequence(e.to_string())],
            )
        }
    }
}

/// Pair each step result with its display label
pub fn trace(sequence: &Sequence, calculation: &CalculationResult) -> Vec<StepTrace> {
    sequence
        .steps()
        .iter()
        .zip(&calculation.per_step_results)
        .enumerate()
        .map(|(index, (step, value))| StepTrace {
            position: index + 1,
            label: step.label(index + 1),
            value: *value,
        })
        .collect()
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "an object",
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::types::{Action, MultiplyFormat, Operand, Operation, Step, StepRef};
    use serde_json::json;

    fn overhead_then_flat_fee() -> Sequence {
        Sequence::new(vec![
            Step::new(
                StepRef::Base,
                vec![Operation::new(Action::Multiply, Operand::parameter("overhead"))],
            )
            .named("Overhead"),
            Step::new(
                StepRef::Step(0),
                vec![Operation::new(Action::Add, Operand::literal(500.0))],
            ),
        ])
    }

    fn overhead_params(value: f64) -> ParameterSet {
        let mut params = ParameterSet::new();
        params.insert("overhead".to_string(), value);
        params
    }

    #[test]
    fn test_calculate_end_to_end() {
        let calc = calculate(&overhead_then_flat_fee(), 1000.0, &overhead_params(15.0));

        assert_eq!(calc.result, 1650.0);
        assert_eq!(calc.per_step_results, vec![1150.0, 1650.0]);
        assert!(calc.is_clean());
        assert_eq!(calc.markup_percent(), Some(65.0));
    }

    #[test]
    fn test_missing_parameter_falls_back_and_continues() {
        let calc = calculate(&overhead_then_flat_fee(), 1000.0, &ParameterSet::new());

        assert_eq!(calc.result, 1500.0);
        assert_eq!(calc.per_step_results, vec![1000.0, 1500.0]);
        assert_eq!(
            calc.errors,
            vec![CalculationError::Step {
                position: 1,
                source: EvalError::MissingParameter("overhead".to_string()),
            }]
        );
        assert_eq!(
            calc.error_messages(),
            vec!["Step 1: Parameter not found: overhead".to_string()]
        );
    }

    #[test]
    fn test_empty_sequence_is_malformed() {
        let calc = calculate(&Sequence::default(), 250.0, &ParameterSet::new());

        assert_eq!(calc.result, 250.0);
        assert!(calc.per_step_results.is_empty());
        assert!(matches!(
            calc.errors.as_slice(),
            [CalculationError::MalformedSequence(_)]
        ));
    }

    #[test]
    fn test_zero_base_short_circuits_silently() {
        let calc = calculate(&overhead_then_flat_fee(), 0.0, &overhead_params(15.0));

        assert_eq!(calc.result, 0.0);
        assert!(calc.per_step_results.is_empty());
        assert!(calc.errors.is_empty());
        assert_eq!(calc.markup_percent(), None);
    }

    #[test]
    fn test_negative_base_short_circuits_with_diagnostic() {
        let calc = calculate(&overhead_then_flat_fee(), -40.0, &overhead_params(15.0));

        assert_eq!(calc.result, -40.0);
        assert!(calc.per_step_results.is_empty());
        assert_eq!(calc.errors, vec![CalculationError::NegativeBaseAmount(-40.0)]);
    }

    #[test]
    fn test_nan_base_is_not_evaluated() {
        let calc = calculate(&overhead_then_flat_fee(), f64::NAN, &overhead_params(15.0));

        assert!(calc.result.is_nan());
        assert!(calc.per_step_results.is_empty());
        assert_eq!(calc.errors, vec![CalculationError::NonFiniteBaseAmount]);
    }

    #[test]
    fn test_division_by_zero_is_local_to_step() {
        let sequence = Sequence::new(vec![
            Step::new(
                StepRef::Base,
                vec![
                    Operation::new(Action::Add, Operand::literal(20.0)),
                    Operation::new(Action::Divide, Operand::parameter("share"))
                        .with_format(MultiplyFormat::Direct),
                ],
            ),
            Step::new(
                StepRef::Step(0),
                vec![Operation::new(Action::Multiply, Operand::literal(2.0))],
            ),
        ]);
        let mut params = ParameterSet::new();
        params.insert("share".to_string(), 0.0);

        let calc = calculate(&sequence, 100.0, &params);

        assert_eq!(calc.per_step_results, vec![120.0, 240.0]);
        assert_eq!(calc.result, 240.0);
        assert_eq!(
            calc.errors,
            vec![CalculationError::Step {
                position: 1,
                source: EvalError::DivisionByZero,
            }]
        );
    }

    #[test]
    fn test_calculate_from_value_parses_stored_list() {
        let raw = json!([
            { "base_index": -1, "operations": [
                { "action": "multiply", "operand": { "type": "parameter", "name": "overhead" }, "multiply_format": "addOne" }
            ]},
            { "base_index": 0, "operations": [
                { "action": "add", "operand": { "type": "literal", "value": 500 } }
            ]}
        ]);

        let calc = calculate_from_value(&raw, 1000.0, &overhead_params(15.0));
        assert_eq!(calc.result, 1650.0);
    }

    #[test]
    fn test_calculate_from_value_rejects_non_list() {
        let calc = calculate_from_value(&json!({ "steps": [] }), 99.0, &ParameterSet::new());

        assert_eq!(calc.result, 99.0);
        assert_eq!(
            calc.errors,
            vec![CalculationError::MalformedSequence(
                "expected a list of steps, found an object".to_string()
            )]
        );
    }

    #[test]
    fn test_calculate_from_value_rejects_unparseable_step() {
        let raw = json!([{ "base_index": "first", "operations": [] }]);
        let calc = calculate_from_value(&raw, 99.0, &ParameterSet::new());

        assert_eq!(calc.result, 99.0);
        assert!(matches!(
            calc.errors.as_slice(),
            [CalculationError::MalformedSequence(_)]
        ));
    }

    #[test]
    fn test_trace_labels_steps() {
        let sequence = overhead_then_flat_fee();
        let calc = calculate(&sequence, 1000.0, &overhead_params(15.0));
        let rows = trace(&sequence, &calc);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "Overhead");
        assert_eq!(rows[1].label, "Step 2");
        assert_eq!(rows[1].value, 1650.0);
    }
}
