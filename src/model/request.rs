//! Risk analysis request model and validation
//!
//! Requests are construct-or-fail: handlers deserialize the body and run
//! [`RiskAnalysisRequest::validate`] before anything else touches it. The
//! validators run in a fixed order and the first violation wins.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const DATE_FORMAT: &str = "%Y-%m-%d";

fn default_llm_model() -> String {
    "openai::gpt-4o-mini".to_string()
}

fn default_document_limit() -> u32 {
    100
}

fn default_batch_size() -> u32 {
    10
}

/// Type of documents the retrieval stage searches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentType {
    #[default]
    News,
    Filings,
    Transcripts,
    All,
    Files,
}

impl DocumentType {
    /// Fiscal-year filtering only applies to document types that carry one
    pub fn supports_fiscal_year(self) -> bool {
        matches!(
            self,
            DocumentType::Filings | DocumentType::Transcripts | DocumentType::All
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::News => "NEWS",
            DocumentType::Filings => "FILINGS",
            DocumentType::Transcripts => "TRANSCRIPTS",
            DocumentType::All => "ALL",
            DocumentType::Files => "FILES",
        }
    }
}

/// Search frequency interval for the retrieval stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Frequency {
    #[serde(rename = "D")]
    Daily,
    #[serde(rename = "W")]
    Weekly,
    #[default]
    #[serde(rename = "M")]
    Monthly,
    #[serde(rename = "3M")]
    Quarterly,
    #[serde(rename = "Y")]
    Yearly,
}

impl Frequency {
    /// Minimum inclusive date span (in days) a request must cover
    pub fn min_days(self) -> i64 {
        match self {
            Frequency::Daily => 1,
            Frequency::Weekly => 7,
            Frequency::Monthly => 30,
            Frequency::Quarterly => 90,
            Frequency::Yearly => 365,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Daily => "D",
            Frequency::Weekly => "W",
            Frequency::Monthly => "M",
            Frequency::Quarterly => "3M",
            Frequency::Yearly => "Y",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request validation errors, one variant per rule
#[derive(Debug, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("must provide either 'company_universe' or 'watchlist_id'")]
    MissingCompanySelector,

    #[error("provide only one of 'company_universe' or 'watchlist_id', not both")]
    AmbiguousCompanySelector,

    #[error("invalid {field}: '{value}' is not a valid YYYY-MM-DD date")]
    InvalidDate { field: &'static str, value: String },

    #[error("start_date must not be after end_date")]
    DateRangeInverted,

    #[error(
        "the range between start_date={start_date} and end_date={end_date} ({days} days) \
         is below the minimum required for frequency '{frequency}' ({min_days} days)"
    )]
    SpanTooShort {
        start_date: String,
        end_date: String,
        days: i64,
        frequency: Frequency,
        min_days: i64,
    },

    #[error("fiscal_year can only be set when document_type is FILINGS, TRANSCRIPTS or ALL")]
    FiscalYearNotSupported,

    #[error("rerank_threshold must be between 0 and 1, got {0}")]
    RerankThresholdOutOfRange(f64),

    #[error("{field} must be a positive integer")]
    NotPositive { field: &'static str },
}

/// How the company universe was specified
#[derive(Debug, Clone, PartialEq)]
pub enum CompanySelector {
    /// Explicit list of knowledge-graph entity IDs
    Universe(Vec<String>),
    /// Reference to an externally stored watchlist
    Watchlist(String),
}

/// An incoming risk analysis request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RiskAnalysisRequest {
    /// The risk scenario to analyze, e.g. "US Import Tariffs against China"
    #[schema(example = "US Import Tariffs against China")]
    pub main_theme: String,

    /// The analyst focus that provides an expert perspective on the scenario
    /// and helps break it down into risks
    pub focus: String,

    /// Knowledge-graph entity IDs representing the companies to track.
    /// Required if `watchlist_id` is not provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = json!(["4A6F00", "D8442A"]))]
    pub company_universe: Option<Vec<String>>,

    /// ID of a watchlist containing the companies to analyze.
    /// Required if `company_universe` is not provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watchlist_id: Option<String>,

    /// Countries, people or organizations that characterize the risk scenario,
    /// keyed by entity category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_entities: Option<HashMap<String, Vec<String>>>,

    /// Start of the analysis window (YYYY-MM-DD)
    #[schema(example = "2025-01-01")]
    pub start_date: String,

    /// End of the analysis window (YYYY-MM-DD)
    #[schema(example = "2025-06-30")]
    pub end_date: String,

    /// Key risk-related terms to drive content retrieval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,

    /// LLM model identifier used for taxonomy creation and semantic analysis
    #[serde(default = "default_llm_model")]
    #[schema(example = "openai::gpt-4o-mini")]
    pub llm_model: String,

    /// Type of documents to analyze
    #[serde(default)]
    pub document_type: DocumentType,

    /// Fiscal year filter; only valid for FILINGS, TRANSCRIPTS or ALL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal_year: Option<i32>,

    /// Threshold in [0, 1] to rerank and filter search results by relevance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_threshold: Option<f64>,

    /// Search frequency interval
    #[serde(default)]
    pub frequency: Frequency,

    /// Maximum number of documents to retrieve per query
    #[serde(default = "default_document_limit")]
    pub document_limit: u32,

    /// Number of entities per batch for parallel querying
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

impl RiskAnalysisRequest {
    /// Resolve the company selector, enforcing that exactly one form is given
    pub fn company_selector(&self) -> Result<CompanySelector, ValidationError> {
        let universe = self
            .company_universe
            .as_ref()
            .filter(|ids| !ids.is_empty());
        let watchlist = self
            .watchlist_id
            .as_ref()
            .filter(|id| !id.trim().is_empty());

        match (universe, watchlist) {
            (Some(_), Some(_)) => Err(ValidationError::AmbiguousCompanySelector),
            (Some(ids), None) => Ok(CompanySelector::Universe(ids.clone())),
            (None, Some(id)) => Ok(CompanySelector::Watchlist(id.clone())),
            (None, None) => Err(ValidationError::MissingCompanySelector),
        }
    }

    /// Validate all request invariants; the first violated rule is reported
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.company_selector()?;

        let start = parse_date("start_date", &self.start_date)?;
        let end = parse_date("end_date", &self.end_date)?;
        if start > end {
            return Err(ValidationError::DateRangeInverted);
        }

        // Inclusive span, like the retrieval windows downstream
        let days = (end - start).num_days() + 1;
        let min_days = self.frequency.min_days();
        if days < min_days {
            return Err(ValidationError::SpanTooShort {
                start_date: self.start_date.clone(),
                end_date: self.end_date.clone(),
                days,
                frequency: self.frequency,
                min_days,
            });
        }

        if self.fiscal_year.is_some() && !self.document_type.supports_fiscal_year() {
            return Err(ValidationError::FiscalYearNotSupported);
        }

        if let Some(threshold) = self.rerank_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ValidationError::RerankThresholdOutOfRange(threshold));
            }
        }

        if self.document_limit == 0 {
            return Err(ValidationError::NotPositive {
                field: "document_limit",
            });
        }
        if self.batch_size == 0 {
            return Err(ValidationError::NotPositive { field: "batch_size" });
        }

        Ok(())
    }
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| ValidationError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> RiskAnalysisRequest {
        RiskAnalysisRequest {
            main_theme: "US Import Tariffs against China".to_string(),
            focus: "Impact on supply chains".to_string(),
            company_universe: Some(vec!["4A6F00".to_string(), "D8442A".to_string()]),
            watchlist_id: None,
            control_entities: None,
            start_date: "2025-01-01".to_string(),
            end_date: "2025-06-30".to_string(),
            keywords: None,
            llm_model: default_llm_model(),
            document_type: DocumentType::News,
            fiscal_year: None,
            rerank_threshold: None,
            frequency: Frequency::Monthly,
            document_limit: 100,
            batch_size: 10,
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(base_request().validate().is_ok());
    }

    #[test]
    fn test_missing_company_selector() {
        let mut request = base_request();
        request.company_universe = None;
        let err = request.validate().unwrap_err();
        assert_eq!(err, ValidationError::MissingCompanySelector);
        assert!(err.to_string().contains("must provide either"));
    }

    #[test]
    fn test_empty_universe_counts_as_missing() {
        let mut request = base_request();
        request.company_universe = Some(vec![]);
        assert_eq!(
            request.validate().unwrap_err(),
            ValidationError::MissingCompanySelector
        );
    }

    #[test]
    fn test_both_selectors_rejected() {
        let mut request = base_request();
        request.watchlist_id = Some("814d0944-a2c1-44f6-8b42-a70c0795428e".to_string());
        assert_eq!(
            request.validate().unwrap_err(),
            ValidationError::AmbiguousCompanySelector
        );
    }

    #[test]
    fn test_watchlist_only_passes() {
        let mut request = base_request();
        request.company_universe = None;
        request.watchlist_id = Some("814d0944-a2c1-44f6-8b42-a70c0795428e".to_string());
        assert!(request.validate().is_ok());
        assert!(matches!(
            request.company_selector().unwrap(),
            CompanySelector::Watchlist(_)
        ));
    }

    #[test]
    fn test_malformed_date_rejected() {
        let mut request = base_request();
        request.start_date = "01/01/2025".to_string();
        assert!(matches!(
            request.validate().unwrap_err(),
            ValidationError::InvalidDate {
                field: "start_date",
                ..
            }
        ));
    }

    #[test]
    fn test_inverted_date_range_rejected() {
        let mut request = base_request();
        request.start_date = "2025-07-01".to_string();
        assert_eq!(
            request.validate().unwrap_err(),
            ValidationError::DateRangeInverted
        );
    }

    #[test]
    fn test_monthly_frequency_needs_thirty_days() {
        let mut request = base_request();
        request.start_date = "2025-08-01".to_string();
        request.end_date = "2025-08-10".to_string();
        request.frequency = Frequency::Monthly;
        let err = request.validate().unwrap_err();
        match err {
            ValidationError::SpanTooShort {
                days, min_days, ..
            } => {
                assert_eq!(days, 10);
                assert_eq!(min_days, 30);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_daily_frequency_accepts_long_span() {
        let mut request = base_request();
        request.start_date = "2025-06-01".to_string();
        request.end_date = "2025-08-01".to_string();
        request.frequency = Frequency::Daily;
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_fiscal_year_requires_compatible_document_type() {
        let mut request = base_request();
        request.fiscal_year = Some(2024);
        assert_eq!(
            request.validate().unwrap_err(),
            ValidationError::FiscalYearNotSupported
        );

        request.document_type = DocumentType::Transcripts;
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_rerank_threshold_bounds() {
        let mut request = base_request();
        request.rerank_threshold = Some(1.5);
        assert_eq!(
            request.validate().unwrap_err(),
            ValidationError::RerankThresholdOutOfRange(1.5)
        );

        request.rerank_threshold = Some(0.85);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_zero_document_limit_rejected() {
        let mut request = base_request();
        request.document_limit = 0;
        assert_eq!(
            request.validate().unwrap_err(),
            ValidationError::NotPositive {
                field: "document_limit"
            }
        );
    }

    #[test]
    fn test_serde_defaults_and_enum_values() {
        let request: RiskAnalysisRequest = serde_json::from_value(serde_json::json!({
            "main_theme": "Tariffs",
            "focus": "Supply chains",
            "watchlist_id": "w-1",
            "start_date": "2025-01-01",
            "end_date": "2025-06-30",
            "frequency": "3M",
            "document_type": "FILINGS"
        }))
        .unwrap();
        assert_eq!(request.frequency, Frequency::Quarterly);
        assert_eq!(request.document_type, DocumentType::Filings);
        assert_eq!(request.document_limit, 100);
        assert_eq!(request.batch_size, 10);
        assert_eq!(request.llm_model, "openai::gpt-4o-mini");
        assert!(request.validate().is_ok());
    }
}
