//! Risk analysis response model
//!
//! The strongly-typed shape the tabular workflow outputs are reshaped into.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Hierarchical decomposition of the risk theme into sub-risks
///
/// Produced once by the taxonomy stage; node IDs are globally unique across
/// the tree (guaranteed upstream).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RiskTaxonomy {
    pub label: String,
    pub node: i64,
    pub summary: Option<String>,
    #[serde(default)]
    #[schema(no_recursion)]
    pub children: Vec<RiskTaxonomy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
}

/// Per-company scoring record, joined from the company-score and motivation
/// tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CompanyScoring {
    pub ticker: String,
    pub sector: String,
    pub industry: String,
    pub composite_score: i64,
    pub motivation: Option<String>,
    /// Per-risk-factor exposure scores; factors whose score was not a number
    /// are absent
    pub risks: BTreeMap<String, i64>,
}

/// One evidentiary content chunk from the labeling stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LabeledChunk {
    pub time_period: String,
    pub date: String,
    pub company: String,
    pub sector: String,
    pub industry: String,
    pub country: String,
    pub ticker: String,
    pub document_id: String,
    pub headline: String,
    pub quote: String,
    pub motivation: String,
    pub sub_scenario: String,
    pub risk_channel: String,
    pub risk_factor: String,
    pub highlights: Vec<String>,
}

/// Full output of a risk analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RiskAnalysisResponse {
    pub risk_taxonomy: RiskTaxonomy,
    /// Company name to scoring record
    pub risk_scoring: BTreeMap<String, CompanyScoring>,
    /// Labeled evidence chunks, in source table row order
    #[serde(default)]
    pub content: Vec<LabeledChunk>,
}
