//! Cost aggregator
//!
//! Folds extracted elements and parametric assembly selections into a
//! [`CostReport`]. Output is deterministic: categories appear in their fixed
//! reporting order regardless of input element order, and identical inputs
//! produce byte-identical reports. The aggregator never hard-fails on
//! partial or defaulted data; coverage gaps surface as a non-empty Unknown
//! bucket.

use std::sync::Arc;

use qto_common::types::{
    AssemblyCost, CategoryBreakdown, CostReport, Element, ElementCategory, ParametricSelection,
};
use tracing::warn;

use super::rates::RateTable;

pub struct CostAggregator {
    rates: Arc<RateTable>,
}

impl CostAggregator {
    pub fn new(rates: Arc<RateTable>) -> Self {
        Self { rates }
    }

    /// Aggregate elements and assembly selections into a cost report.
    ///
    /// `accuracy_band` is passed through from extraction metadata untouched.
    pub fn aggregate(
        &self,
        elements: &[Element],
        selections: &[ParametricSelection],
        accuracy_band: Option<String>,
        processing_duration_secs: Option<f64>,
    ) -> CostReport {
        let mut categories = Vec::with_capacity(ElementCategory::REPORT_ORDER.len());
        let mut total_cost = 0.0;

        for category in ElementCategory::REPORT_ORDER {
            let bucket: Vec<Element> = elements
                .iter()
                .filter(|e| e.category == category)
                .cloned()
                .collect();

            // The five canonical categories always appear; the Unknown
            // bucket only when extraction left something uncategorized.
            if bucket.is_empty() && category == ElementCategory::Unknown {
                continue;
            }

            let subtotal: f64 = bucket.iter().map(|e| e.total_cost).sum();
            total_cost += subtotal;

            categories.push(CategoryBreakdown {
                category,
                elements: bucket,
                subtotal,
            });
        }

        let mut parametric_assemblies = Vec::with_capacity(selections.len());
        for selection in selections {
            let Some(assembly) = self.rates.assembly(&selection.assembly_id) else {
                warn!(
                    assembly_id = %selection.assembly_id,
                    "unknown parametric assembly selection skipped"
                );
                continue;
            };

            let escalation_percent = self.rates.escalation_percent(selection.year);
            let assembly_total = assembly.base_unit_cost
                * (1.0 + escalation_percent / 100.0)
                * selection.quantity;
            total_cost += assembly_total;

            parametric_assemblies.push(AssemblyCost {
                assembly: assembly.clone(),
                escalation_percent,
                selected_quantity: selection.quantity,
                total_cost: assembly_total,
            });
        }

        CostReport {
            categories,
            parametric_assemblies,
            total_elements: elements.len(),
            total_cost,
            accuracy_band,
            processing_duration_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qto_common::types::ParametricAssembly;
    use std::collections::{BTreeMap, HashMap};

    fn aggregator() -> CostAggregator {
        CostAggregator::new(Arc::new(RateTable::default()))
    }

    /// A table whose only escalation entry is 5% so assembly math is exact.
    fn five_percent_table() -> CostAggregator {
        let table: RateTable = serde_json::from_value(serde_json::json!({
            "unit_costs": HashMap::<String, f64>::new(),
            "escalation": BTreeMap::from([(2025, 5.0)]),
            "assemblies": [ParametricAssembly {
                id: "asm-1".to_string(),
                name: "Timber frame wall system".to_string(),
                base_unit_cost: 1000.0,
                eco_rating: Some("A".to_string()),
                components: vec![],
            }]
        }))
        .unwrap();
        CostAggregator::new(Arc::new(table))
    }

    fn sample_elements() -> Vec<Element> {
        vec![
            Element::new("c-1", ElementCategory::Structural, "column", 4.0, "ea", 310.0),
            Element::new("w-1", ElementCategory::Architectural, "window", 3.0, "ea", 420.0),
            Element::new("d-1", ElementCategory::Mep, "duct", 9.0, "m", 52.0),
        ]
    }

    #[test]
    fn test_assembly_escalation_formula() {
        let report = five_percent_table().aggregate(
            &[],
            &[ParametricSelection {
                assembly_id: "asm-1".to_string(),
                quantity: 10.0,
                year: None,
            }],
            None,
            None,
        );

        assert_eq!(report.parametric_assemblies.len(), 1);
        let assembly = &report.parametric_assemblies[0];
        assert_eq!(assembly.escalation_percent, 5.0);
        assert_eq!(assembly.total_cost, 10500.0);
        assert_eq!(report.total_cost, 10500.0);
    }

    #[test]
    fn test_grand_total_is_sum_of_subtotals_and_assemblies() {
        let elements = sample_elements();
        let report = aggregator().aggregate(&elements, &[], None, None);

        let subtotal_sum: f64 = report.categories.iter().map(|c| c.subtotal).sum();
        assert_eq!(report.total_cost, subtotal_sum);
        assert_eq!(report.total_elements, 3);
    }

    #[test]
    fn test_category_order_is_fixed_regardless_of_input_order() {
        let mut reversed = sample_elements();
        reversed.reverse();

        let a = aggregator().aggregate(&sample_elements(), &[], None, None);
        let b = aggregator().aggregate(&reversed, &[], None, None);

        let order_a: Vec<ElementCategory> = a.categories.iter().map(|c| c.category).collect();
        let order_b: Vec<ElementCategory> = b.categories.iter().map(|c| c.category).collect();
        assert_eq!(order_a, order_b);
        assert_eq!(order_a[0], ElementCategory::Structural);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let elements = sample_elements();
        let selections = vec![ParametricSelection {
            assembly_id: "asm-timber-frame-wall".to_string(),
            quantity: 2.0,
            year: Some(2024),
        }];

        let first = aggregator().aggregate(&elements, &selections, Some("±10%".into()), Some(4.2));
        let second = aggregator().aggregate(&elements, &selections, Some("±10%".into()), Some(4.2));

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_canonical_categories_always_present_unknown_only_when_populated() {
        let report = aggregator().aggregate(&sample_elements(), &[], None, None);
        assert_eq!(report.categories.len(), 5);
        assert!(report
            .categories
            .iter()
            .all(|c| c.category != ElementCategory::Unknown));

        let with_unknown = vec![Element::new(
            "x",
            ElementCategory::Unknown,
            "mystery",
            1.0,
            "ea",
            10.0,
        )];
        let report = aggregator().aggregate(&with_unknown, &[], None, None);
        assert_eq!(report.categories.len(), 6);
        assert_eq!(
            report.categories.last().unwrap().category,
            ElementCategory::Unknown
        );
        assert_eq!(report.categories.last().unwrap().subtotal, 10.0);
    }

    #[test]
    fn test_unknown_selection_is_skipped_not_fatal() {
        let report = aggregator().aggregate(
            &[],
            &[ParametricSelection {
                assembly_id: "asm-does-not-exist".to_string(),
                quantity: 1.0,
                year: None,
            }],
            None,
            None,
        );
        assert!(report.parametric_assemblies.is_empty());
        assert_eq!(report.total_cost, 0.0);
    }

    #[test]
    fn test_accuracy_band_is_passed_through() {
        let report = aggregator().aggregate(&[], &[], Some("class 3".to_string()), None);
        assert_eq!(report.accuracy_band.as_deref(), Some("class 3"));
    }

    #[test]
    fn test_flattened_export_sums_to_grand_total() {
        let elements = sample_elements();
        let selections = vec![ParametricSelection {
            assembly_id: "asm-curtain-wall".to_string(),
            quantity: 3.0,
            year: Some(2023),
        }];
        let report = aggregator().aggregate(&elements, &selections, None, None);

        let exported: f64 = report.flatten().iter().map(|r| r.total_cost).sum();
        assert_eq!(exported, report.total_cost);
    }
}
