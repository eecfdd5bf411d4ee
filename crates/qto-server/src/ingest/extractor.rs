//! Element extractor
//!
//! Normalizes the loosely-typed result payload of a completed translation
//! into [`Element`] records. Individual bad fields never abort extraction:
//! unrecognized categories land in `Unknown`, and negative or non-numeric
//! quantity/cost values coerce to 0 with a logged warning. Only a payload
//! whose overall structure cannot be decoded is a hard error.

use std::sync::Arc;

use qto_common::types::{Element, ElementCategory};
use qto_common::{QtoError, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::rates::RateTable;

/// Expected overall payload shape. Field-level trouble is tolerated, which
/// is why the numeric fields stay raw JSON values here.
#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(default)]
    metadata: RawMetadata,
    elements: Vec<RawElement>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    accuracy_band: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawElement {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(rename = "type", default)]
    element_type: Option<String>,
    #[serde(default)]
    quantity: Option<Value>,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    unit_cost: Option<Value>,
}

/// Output of one extraction run.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub elements: Vec<Element>,
    /// Pass-through label from payload metadata
    pub accuracy_band: Option<String>,
}

pub struct ElementExtractor {
    rates: Arc<RateTable>,
}

impl ElementExtractor {
    pub fn new(rates: Arc<RateTable>) -> Self {
        Self { rates }
    }

    /// Normalize a raw result payload into elements.
    ///
    /// Returns `ExtractionDataError` only when the payload as a whole cannot
    /// be decoded.
    pub fn extract(&self, payload: &Value) -> Result<Extraction> {
        let raw: RawResult = serde_json::from_value(payload.clone())
            .map_err(|e| QtoError::ExtractionDataError(e.to_string()))?;

        let mut elements = Vec::with_capacity(raw.elements.len());

        for (index, record) in raw.elements.into_iter().enumerate() {
            let id = record
                .id
                .unwrap_or_else(|| format!("element-{}", index));

            let category = match record.category.as_deref() {
                Some(label) => ElementCategory::parse(label),
                None => ElementCategory::Unknown,
            };
            if category == ElementCategory::Unknown {
                debug!(
                    element_id = %id,
                    label = record.category.as_deref().unwrap_or(""),
                    "uncategorized element kept in unknown bucket"
                );
            }

            let element_type = record
                .element_type
                .unwrap_or_else(|| "unspecified".to_string());

            let quantity = coerce_non_negative(record.quantity.as_ref(), "quantity", &id);

            let unit_cost = match record.unit_cost.as_ref() {
                Some(value) => coerce_non_negative(Some(value), "unit_cost", &id),
                None => self
                    .rates
                    .unit_cost(category, &element_type)
                    .unwrap_or_else(|| {
                        debug!(
                            element_id = %id,
                            category = %category,
                            element_type = %element_type,
                            "no rate table entry, unit cost defaults to 0"
                        );
                        0.0
                    }),
            };

            elements.push(Element::new(
                id,
                category,
                element_type,
                quantity,
                record.unit.unwrap_or_else(|| "ea".to_string()),
                unit_cost,
            ));
        }

        Ok(Extraction {
            elements,
            accuracy_band: raw.metadata.accuracy_band,
        })
    }
}

/// Coerce a raw JSON value into a non-negative quantity/cost figure.
/// Anything that is not a non-negative number becomes 0 with a warning.
fn coerce_non_negative(value: Option<&Value>, field: &str, element_id: &str) -> f64 {
    let coerced = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match coerced {
        Some(v) if v >= 0.0 && v.is_finite() => v,
        Some(v) => {
            warn!(
                element_id,
                field,
                value = v,
                "negative value coerced to 0"
            );
            0.0
        },
        None => {
            warn!(element_id, field, raw = ?value, "non-numeric value coerced to 0");
            0.0
        },
    }
}
