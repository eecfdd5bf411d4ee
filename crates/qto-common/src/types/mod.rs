//! Common types used across QTO
//!
//! Domain types for the model ingestion pipeline: upload jobs, extracted
//! elements, parametric assemblies, and the aggregated cost report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Upload Jobs
// ============================================================================

/// Upload job status
///
/// Transitions run monotonically forward through
/// `Pending → Uploading → Translating → Polling` and end in exactly one of
/// the terminal states. Terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Uploading,
    Translating,
    Polling,
    Complete,
    Failed,
    TimedOut,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Uploading => "uploading",
            JobStatus::Translating => "translating",
            JobStatus::Polling => "polling",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed_out",
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Complete | JobStatus::Failed | JobStatus::TimedOut
        )
    }
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        match s {
            "pending" => JobStatus::Pending,
            "uploading" => JobStatus::Uploading,
            "translating" => JobStatus::Translating,
            "polling" => JobStatus::Polling,
            "complete" => JobStatus::Complete,
            "failed" => JobStatus::Failed,
            "timed_out" => JobStatus::TimedOut,
            _ => JobStatus::Pending,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One asynchronous submit-poll-extract unit of work.
///
/// Created by the ingestion gateway and owned exclusively by the
/// orchestrator until it reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadJob {
    /// Job identifier, assigned by the gateway
    pub id: Uuid,

    /// Opaque identifier the external translation service polls by
    pub translation_id: String,

    /// Original file name as uploaded
    pub source_file_name: String,

    /// Lowercased file extension (no dot)
    pub file_extension: String,

    /// Payload size in bytes
    pub file_size_bytes: i64,

    /// SHA-256 of the accepted payload
    pub checksum_sha256: String,

    pub status: JobStatus,

    /// Status checks performed so far
    pub attempts: i64,

    /// Last progress figure reported by the translation service (0-100)
    pub progress_percent: i64,

    /// Terminal error message, when Failed or TimedOut
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,

    pub last_polled_at: Option<DateTime<Utc>>,

    pub completed_at: Option<DateTime<Utc>>,
}

impl UploadJob {
    /// Wall-clock duration from creation to the terminal transition, when
    /// the job has finished.
    pub fn processing_duration_secs(&self) -> Option<f64> {
        self.completed_at
            .map(|done| (done - self.created_at).num_milliseconds() as f64 / 1000.0)
    }
}

// ============================================================================
// Elements
// ============================================================================

/// Quantity-takeoff category for an extracted element.
///
/// The five canonical categories have a fixed reporting order; anything the
/// translation service labels outside them lands in `Unknown` rather than
/// being dropped, so coverage gaps stay visible downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementCategory {
    Structural,
    Architectural,
    Mep,
    Finishes,
    External,
    Unknown,
}

impl ElementCategory {
    /// Reporting order: the five canonical categories, then `Unknown`.
    pub const REPORT_ORDER: [ElementCategory; 6] = [
        ElementCategory::Structural,
        ElementCategory::Architectural,
        ElementCategory::Mep,
        ElementCategory::Finishes,
        ElementCategory::External,
        ElementCategory::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementCategory::Structural => "structural",
            ElementCategory::Architectural => "architectural",
            ElementCategory::Mep => "mep",
            ElementCategory::Finishes => "finishes",
            ElementCategory::External => "external",
            ElementCategory::Unknown => "unknown",
        }
    }

    /// Parse a category label from a raw payload, case-insensitively.
    /// Unrecognized labels map to `Unknown`.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "structural" => ElementCategory::Structural,
            "architectural" => ElementCategory::Architectural,
            "mep" => ElementCategory::Mep,
            "finishes" => ElementCategory::Finishes,
            "external" => ElementCategory::External,
            _ => ElementCategory::Unknown,
        }
    }
}

impl std::fmt::Display for ElementCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single categorized quantity-takeoff record extracted from a building
/// model. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    pub category: ElementCategory,
    #[serde(rename = "type")]
    pub element_type: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_cost: f64,
    pub total_cost: f64,
}

impl Element {
    /// Build an element, deriving `total_cost = quantity * unit_cost`.
    pub fn new(
        id: impl Into<String>,
        category: ElementCategory,
        element_type: impl Into<String>,
        quantity: f64,
        unit: impl Into<String>,
        unit_cost: f64,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            element_type: element_type.into(),
            quantity,
            unit: unit.into(),
            unit_cost,
            total_cost: quantity * unit_cost,
        }
    }
}

// ============================================================================
// Parametric Assemblies
// ============================================================================

/// One material line inside a parametric assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyComponent {
    pub material: String,
    pub quantity: f64,
    pub unit: String,
}

/// A pre-configured multi-material construction assembly with a composite
/// unit cost. Catalog entry; costing happens in the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametricAssembly {
    pub id: String,
    pub name: String,
    pub base_unit_cost: f64,
    pub eco_rating: Option<String>,
    #[serde(default)]
    pub components: Vec<AssemblyComponent>,
}

/// A caller-chosen assembly and quantity, optionally pinned to a cost year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametricSelection {
    pub assembly_id: String,
    pub quantity: f64,
    /// Escalation year; the latest known year applies when absent.
    #[serde(default)]
    pub year: Option<i32>,
}

/// A costed assembly as it appears in a report:
/// `total_cost = base_unit_cost * (1 + escalation_percent/100) * quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyCost {
    pub assembly: ParametricAssembly,
    pub escalation_percent: f64,
    pub selected_quantity: f64,
    pub total_cost: f64,
}

// ============================================================================
// Cost Reports
// ============================================================================

/// Elements of one category with their subtotal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: ElementCategory,
    pub elements: Vec<Element>,
    pub subtotal: f64,
}

/// The aggregated, immutable output of the pipeline.
///
/// Categories appear in [`ElementCategory::REPORT_ORDER`] regardless of
/// input element order, so aggregation over identical inputs is
/// byte-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub categories: Vec<CategoryBreakdown>,
    pub parametric_assemblies: Vec<AssemblyCost>,
    pub total_elements: usize,
    pub total_cost: f64,
    /// Pass-through label from extraction metadata, never computed here
    pub accuracy_band: Option<String>,
    pub processing_duration_secs: Option<f64>,
}

impl CostReport {
    /// Flatten the report into export rows for downstream report/CSV
    /// generation. Summing the `total_cost` column reproduces
    /// [`CostReport::total_cost`] exactly.
    pub fn flatten(&self) -> Vec<ExportRecord> {
        let mut rows = Vec::with_capacity(self.total_elements + self.parametric_assemblies.len());

        for breakdown in &self.categories {
            for element in &breakdown.elements {
                rows.push(ExportRecord {
                    category: breakdown.category.as_str().to_string(),
                    element_type: element.element_type.clone(),
                    quantity: element.quantity,
                    unit: element.unit.clone(),
                    unit_cost: element.unit_cost,
                    total_cost: element.total_cost,
                });
            }
        }

        for assembly in &self.parametric_assemblies {
            rows.push(ExportRecord {
                category: "parametric".to_string(),
                element_type: assembly.assembly.name.clone(),
                quantity: assembly.selected_quantity,
                unit: "assembly".to_string(),
                unit_cost: assembly.assembly.base_unit_cost
                    * (1.0 + assembly.escalation_percent / 100.0),
                total_cost: assembly.total_cost,
            });
        }

        rows
    }
}

/// One flat export row with columns
/// `[category, type, quantity, unit, unit_cost, total_cost]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub category: String,
    #[serde(rename = "type")]
    pub element_type: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_cost: f64,
    pub total_cost: f64,
}
