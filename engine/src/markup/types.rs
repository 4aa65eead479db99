// Markup Engine - Type Definitions
//
// JSON calculation sequences authored by configuration tooling.
// All types deserialize from the stored configuration format; the legacy
// `-1` "use base amount" sentinel is converted into an explicit variant at
// the serde boundary and never reaches the evaluator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Named percentage parameters (e.g. `"overhead" -> 15.0` means 15%)
pub type ParameterSet = HashMap<String, f64>;

// ============================================================================
// ITEM CATEGORIES
// ============================================================================

/// Item category of a bill-of-quantities line item
///
/// Each category carries its own independent calculation sequence and its
/// own base amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Work,
    Material,
    SubcontractWork,
    SubcontractMaterial,
    ComponentWork,
    ComponentMaterial,
}

impl Category {
    /// All categories in canonical order
    pub const ALL: [Category; 6] = [
        Category::Work,
        Category::Material,
        Category::SubcontractWork,
        Category::SubcontractMaterial,
        Category::ComponentWork,
        Category::ComponentMaterial,
    ];

    /// Stored configuration key
    pub fn key(&self) -> &'static str {
        match self {
            Category::Work => "work",
            Category::Material => "material",
            Category::SubcontractWork => "subcontract_work",
            Category::SubcontractMaterial => "subcontract_material",
            Category::ComponentWork => "component_work",
            Category::ComponentMaterial => "component_material",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ============================================================================
// REFERENCES
// ============================================================================

/// Source of a step's base value
///
/// Stored as an integer: `-1` is the category base amount, `n >= 0` is the
/// memoized result of step `n` (0-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum StepRef {
    /// The category base amount
    Base,

    /// Result of an earlier step (0-based index)
    Step(usize),
}

impl TryFrom<i64> for StepRef {
    type Error = String;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            -1 => Ok(StepRef::Base),
            n if n >= 0 => Ok(StepRef::Step(n as usize)),
            n => Err(format!(
                "invalid step reference {n}: expected -1 (base amount) or a step index"
            )),
        }
    }
}

impl From<StepRef> for i64 {
    fn from(step_ref: StepRef) -> Self {
        match step_ref {
            StepRef::Base => -1,
            StepRef::Step(index) => index as i64,
        }
    }
}

// ============================================================================
// OPERATIONS
// ============================================================================

/// Binary action applied to the running value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Multiply,
    Divide,
    Add,
    Subtract,
}

/// How a percentage parameter is read under multiply/divide
///
/// - `AddOne`: factor is `1 + p/100` (a 10% markup multiplies by 1.10)
/// - `Direct`: factor is `p/100` (a 10% share multiplies by 0.10)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MultiplyFormat {
    #[default]
    AddOne,
    Direct,
}

/// Operand of a single operation
///
/// Stored configs may encode the base amount as `{"type": "step_result",
/// "index": -1}`; that form parses to `Operand::Base`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", try_from = "StoredOperand")]
pub enum Operand {
    /// The category base amount
    Base,

    /// Memoized result of an earlier step (0-based index)
    StepResult { index: usize },

    /// Named percentage parameter
    Parameter { name: String },

    /// Constant. A missing value parses but fails at evaluation time.
    Literal { value: Option<f64> },
}

/// Stored form of an operand, with the legacy signed step index
#[doc(hidden)]
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoredOperand {
    Base,
    StepResult {
        index: i64,
    },
    Parameter {
        name: String,
    },
    Literal {
        #[serde(default)]
        value: Option<f64>,
    },
}

impl TryFrom<StoredOperand> for Operand {
    type Error = String;

    fn try_from(stored: StoredOperand) -> Result<Self, Self::Error> {
        Ok(match stored {
            StoredOperand::Base => Operand::Base,
            StoredOperand::StepResult { index } => match StepRef::try_from(index)? {
                StepRef::Base => Operand::Base,
                StepRef::Step(index) => Operand::StepResult { index },
            },
            StoredOperand::Parameter { name } => Operand::Parameter { name },
            StoredOperand::Literal { value } => Operand::Literal { value },
        })
    }
}

impl Operand {
    pub fn parameter(name: impl Into<String>) -> Self {
        Operand::Parameter { name: name.into() }
    }

    pub fn literal(value: f64) -> Self {
        Operand::Literal { value: Some(value) }
    }

    pub fn step(index: usize) -> Self {
        Operand::StepResult { index }
    }

    /// True if the operand carries percentage semantics
    pub fn is_parameter(&self) -> bool {
        matches!(self, Operand::Parameter { .. })
    }
}

/// One binary operation of a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub action: Action,

    pub operand: Operand,

    /// Only meaningful for parameter operands under multiply/divide
    #[serde(default)]
    pub multiply_format: MultiplyFormat,
}

impl Operation {
    pub fn new(action: Action, operand: Operand) -> Self {
        Self {
            action,
            operand,
            multiply_format: MultiplyFormat::default(),
        }
    }

    pub fn with_format(mut self, multiply_format: MultiplyFormat) -> Self {
        self.multiply_format = multiply_format;
        self
    }
}

// ============================================================================
// STEPS AND SEQUENCES
// ============================================================================

/// One node of a calculation sequence
///
/// The first operation acts on the step's base value; every later operation
/// acts on the running result of the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Optional display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub base_index: StepRef,

    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl Step {
    pub fn new(base_index: StepRef, operations: Vec<Operation>) -> Self {
        Self {
            name: None,
            base_index,
            operations,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Label for diagnostics and step-by-step display
    pub fn label(&self, position: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("Step {position}"),
        }
    }
}

/// Ordered list of steps for one category
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sequence {
    steps: Vec<Step>,
}

impl Sequence {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl From<Vec<Step>> for Sequence {
    fn from(steps: Vec<Step>) -> Self {
        Self::new(steps)
    }
}

impl FromIterator<Step> for Sequence {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// ============================================================================
// TESTS
// ============================================================================
