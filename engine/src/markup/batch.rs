// Markup Engine - Line Item Batches
//
// Every (line item, category) calculation is independent, so a batch of
// bill-of-quantities items is fanned out across the rayon pool.

use crate::markup::calculator::CalculationResult;
use crate::markup::policy::MarkupPolicy;
use crate::markup::types::Category;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Direct costs of one line item, per category
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LineItemCosts {
    pub item_id: String,

    #[serde(default)]
    pub base_amounts: BTreeMap<Category, f64>,
}

impl LineItemCosts {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            base_amounts: BTreeMap::new(),
        }
    }

    pub fn with_amount(mut self, category: Category, base_amount: f64) -> Self {
        self.base_amounts.insert(category, base_amount);
        self
    }
}

/// Commercial costs of one line item, per category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItemMarkup {
    pub item_id: String,
    pub categories: BTreeMap<Category, CalculationResult>,
}

impl LineItemMarkup {
    pub fn total_base(&self) -> f64 {
        self.categories.values().map(|calc| calc.base_amount).sum()
    }

    pub fn total_commercial(&self) -> f64 {
        self.categories.values().map(|calc| calc.result).sum()
    }

    pub fn has_errors(&self) -> bool {
        self.categories.values().any(|calc| !calc.is_clean())
    }
}

impl MarkupPolicy {
    /// Calculate every category present on one line item
    pub fn calculate_line_item(&self, item: &LineItemCosts) -> LineItemMarkup {
        let categories = item
            .base_amounts
            .iter()
            .map(|(category, base_amount)| (*category, self.calculate(*category, *base_amount)))
            .collect();

        LineItemMarkup {
            item_id: item.item_id.clone(),
            categories,
        }
    }

    /// Calculate a batch of line items in parallel
    ///
    /// Output order matches input order.
    pub fn calculate_line_items(&self, items: &[LineItemCosts]) -> Vec<LineItemMarkup> {
        debug!(items = items.len(), config_id = %self.config_id(), "calculating line item batch");
        items
            .par_iter()
            .map(|item| self.calculate_line_item(item))
            .collect()
    }
}

/// Sum of commercial costs per category across a batch
pub fn totals_by_category(markups: &[LineItemMarkup]) -> BTreeMap<Category, f64> {
    let mut totals = BTreeMap::new();
    for markup in markups {
        for (category, calc) in &markup.categories {
            *totals.entry(*category).or_insert(0.0) += calc.result;
        }
    }
    totals
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::policy::MarkupConfig;
    use crate::markup::types::{Action, Operand, Operation, ParameterSet, Sequence, Step, StepRef};

    fn create_test_policy() -> MarkupPolicy {
        let mut parameters = ParameterSet::new();
        parameters.insert("overhead".to_string(), 10.0);

        let mut sequences = BTreeMap::new();
        sequences.insert(
            Category::Work,
            Sequence::new(vec![Step::new(
                StepRef::Base,
                vec![Operation::new(Action::Multiply, Operand::parameter("overhead"))],
            )]),
        );
        sequences.insert(
            Category::Material,
            Sequence::new(vec![Step::new(
                StepRef::Base,
                vec![Operation::new(Action::Add, Operand::literal(5.0))],
            )]),
        );

        MarkupPolicy::new(MarkupConfig {
            version: "1.0".to_string(),
            config_id: "batch".to_string(),
            description: None,
            parameters,
            sequences,
        })
    }

    #[test]
    fn test_line_item_totals() {
        let policy = create_test_policy();
        let item = LineItemCosts::new("POS-1")
            .with_amount(Category::Work, 100.0)
            .with_amount(Category::Material, 40.0);

        let markup = policy.calculate_line_item(&item);

        assert_eq!(markup.item_id, "POS-1");
        assert_eq!(markup.total_base(), 140.0);
        assert_eq!(markup.total_commercial(), 155.0);
        assert!(!markup.has_errors());
    }

    #[test]
    fn test_unconfigured_category_flags_item() {
        let policy = create_test_policy();
        let item = LineItemCosts::new("POS-2").with_amount(Category::SubcontractWork, 10.0);

        let markup = policy.calculate_line_item(&item);
        assert!(markup.has_errors());
        assert_eq!(markup.total_commercial(), 10.0);
    }

    #[test]
    fn test_batch_preserves_order() {
        let policy = create_test_policy();
        let items: Vec<LineItemCosts> = (0..64)
            .map(|i| LineItemCosts::new(format!("POS-{i}")).with_amount(Category::Work, 100.0 * i as f64))
            .collect();

        let markups = policy.calculate_line_items(&items);

        assert_eq!(markups.len(), 64);
        for (i, markup) in markups.iter().enumerate() {
            assert_eq!(markup.item_id, format!("POS-{i}"));
            assert_eq!(markup.total_commercial(), 110.0 * i as f64);
        }
    }

    #[test]
    fn test_totals_by_category() {
        let policy = create_test_policy();
        let items = vec![
            LineItemCosts::new("A").with_amount(Category::Work, 100.0),
            LineItemCosts::new("B")
                .with_amount(Category::Work, 200.0)
                .with_amount(Category::Material, 10.0),
        ];

        let totals = totals_by_category(&policy.calculate_line_items(&items));
        assert_eq!(totals[&Category::Work], 330.0);
        assert_eq!(totals[&Category::Material], 15.0);
    }
}
