// Markup Engine - Sequence Validation
//
// Static structural checks run before a sequence is saved:
// - Base index references only earlier steps
// - Every step has a first operation
// - Step result operands reference only earlier steps
//
// Backward-only references make the step graph acyclic, so no separate
// cycle detection is needed.

use crate::markup::types::{Operand, Sequence, StepRef};
use serde::Serialize;
use thiserror::Error;

/// Validation errors. Positions are 1-based, indices 0-based.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
pub enum ValidationError {
    #[error("Step {position}: base index {index} must reference an earlier step")]
    InvalidBaseIndex { position: usize, index: usize },

    #[error("Step {position}: first operation is required")]
    MissingOperation { position: usize },

    #[error("Step {position}, operation {operation}: step result {index} must reference an earlier step")]
    InvalidStepReference {
        position: usize,
        operation: usize,
        index: usize,
    },

    /// Reported by `MarkupPolicy::validate` for a configured category
    #[error("Sequence has no steps")]
    EmptySequence,
}

/// Validate a sequence before it is persisted or evaluated
///
/// Returns every structural problem found; an empty list means the
/// sequence is valid.
///
/// # Example
///
/// ```rust
/// use tender_markup_engine::markup::{validate, Action, Operand, Operation, Sequence, Step, StepRef};
///
/// let sequence = Sequence::new(vec![
///     Step::new(StepRef::Step(0), vec![Operation::new(Action::Add, Operand::literal(1.0))]),
/// ]);
///
/// let errors = validate(&sequence);
/// assert_eq!(errors.len(), 1);
/// assert_eq!(errors[0].to_string(), "Step 1: base index 0 must reference an earlier step");
/// ```
pub fn validate(sequence: &Sequence) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (index, step) in sequence.steps().iter().enumerate() {
        let position = index + 1;

        if let StepRef::Step(base) = step.base_index {
            if base >= index {
                errors.push(ValidationError::InvalidBaseIndex {
                    position,
                    index: base,
                });
            }
        }

        if step.operations.is_empty() {
            errors.push(ValidationError::MissingOperation { position });
        }

        for (op_index, operation) in step.operations.iter().enumerate() {
            if let Operand::StepResult { index: referenced } = operation.operand {
                if referenced >= index {
                    errors.push(ValidationError::InvalidStepReference {
                        position,
                        operation: op_index + 1,
                        index: referenced,
                    });
                }
            }
        }
    }

    errors
}

/// True if `validate` finds nothing
pub fn is_valid(sequence: &Sequence) -> bool {
    validate(sequence).is_empty()
}

// ============================================================================
// TESTS
// ============================================================================
