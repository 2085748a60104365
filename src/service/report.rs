//! Response assembly from the workflow's tabular outputs
//!
//! Joins the company-score and motivation tables, maps the labeled content
//! table 1:1 into chunks, and embeds the taxonomy tree. The build is
//! all-or-nothing: any missing column, unreadable score or failed join aborts
//! the whole response.

use std::collections::BTreeMap;

use crate::model::table::{CellValue, DataTable, Row};
use crate::model::{CompanyScoring, LabeledChunk, RiskAnalysisResponse, RiskTaxonomy};

const COMPANY_TABLE: &str = "company score";
const MOTIVATION_TABLE: &str = "motivation";
const LABELED_TABLE: &str = "labeled content";

const COL_COMPANY: &str = "Company";
const COL_TICKER: &str = "Ticker";
const COL_SECTOR: &str = "Sector";
const COL_INDUSTRY: &str = "Industry";
const COL_COMPOSITE_SCORE: &str = "Composite Score";
const COL_MOTIVATION: &str = "Motivation";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Missing expected column '{column}' in {table} table")]
    MissingColumn {
        table: &'static str,
        column: String,
    },

    #[error("Column '{column}' in {table} table has an unexpected type (expected {expected})")]
    ColumnType {
        table: &'static str,
        column: String,
        expected: &'static str,
    },

    #[error("No motivation found for company '{0}'")]
    MotivationNotFound(String),

    #[error("Duplicate company '{0}' in the company score table")]
    DuplicateCompany(String),

    #[error("Score '{column}' for company '{company}' is not an integer: {value}")]
    NonIntegerScore {
        company: String,
        column: String,
        value: f64,
    },
}

/// Assemble the final typed response from the four pipeline outputs
pub fn build_response(
    company_table: DataTable,
    motivation_table: DataTable,
    labeled_table: DataTable,
    taxonomy: RiskTaxonomy,
) -> Result<RiskAnalysisResponse, ReportError> {
    let mut risk_scoring = BTreeMap::new();
    for mut row in company_table.rows {
        let company = take_text(&mut row, COMPANY_TABLE, COL_COMPANY)?;
        if risk_scoring.contains_key(&company) {
            return Err(ReportError::DuplicateCompany(company));
        }

        let ticker = take_text(&mut row, COMPANY_TABLE, COL_TICKER)?;
        let sector = take_text(&mut row, COMPANY_TABLE, COL_SECTOR)?;
        let industry = take_text(&mut row, COMPANY_TABLE, COL_INDUSTRY)?;
        let composite_score =
            take_score(&mut row, &company, COL_COMPOSITE_SCORE)?.ok_or_else(|| {
                ReportError::ColumnType {
                    table: COMPANY_TABLE,
                    column: COL_COMPOSITE_SCORE.to_string(),
                    expected: "integer",
                }
            })?;
        let motivation = lookup_motivation(&motivation_table, &company)?;

        // Everything left over is a named risk score; NaN scores are dropped
        // entirely, never coerced.
        let mut risks = BTreeMap::new();
        for (column, cell) in row.into_cells() {
            if let Some(score) = score_from_cell(cell, &company, &column)? {
                risks.insert(column, score);
            }
        }

        risk_scoring.insert(
            company,
            CompanyScoring {
                ticker,
                sector,
                industry,
                composite_score,
                motivation,
                risks,
            },
        );
    }

    let mut content = Vec::with_capacity(labeled_table.len());
    for mut row in labeled_table.rows {
        content.push(build_chunk(&mut row)?);
    }

    Ok(RiskAnalysisResponse {
        risk_taxonomy: taxonomy,
        risk_scoring,
        content,
    })
}

/// Find the single motivation for a company; zero matches is an error, the
/// first match wins
fn lookup_motivation(
    motivation_table: &DataTable,
    company: &str,
) -> Result<Option<String>, ReportError> {
    for row in &motivation_table.rows {
        let candidate = row
            .get(COL_COMPANY)
            .ok_or_else(|| ReportError::MissingColumn {
                table: MOTIVATION_TABLE,
                column: COL_COMPANY.to_string(),
            })?;
        if !matches!(candidate, CellValue::Text(name) if name == company) {
            continue;
        }

        return match row.get(COL_MOTIVATION) {
            None => Err(ReportError::MissingColumn {
                table: MOTIVATION_TABLE,
                column: COL_MOTIVATION.to_string(),
            }),
            Some(CellValue::Text(motivation)) => Ok(Some(motivation.clone())),
            Some(CellValue::Null) => Ok(None),
            Some(_) => Err(ReportError::ColumnType {
                table: MOTIVATION_TABLE,
                column: COL_MOTIVATION.to_string(),
                expected: "string",
            }),
        };
    }

    Err(ReportError::MotivationNotFound(company.to_string()))
}

fn build_chunk(row: &mut Row) -> Result<LabeledChunk, ReportError> {
    Ok(LabeledChunk {
        time_period: take_text(row, LABELED_TABLE, "Time Period")?,
        date: take_text(row, LABELED_TABLE, "Date")?,
        company: take_text(row, LABELED_TABLE, COL_COMPANY)?,
        sector: take_text(row, LABELED_TABLE, COL_SECTOR)?,
        industry: take_text(row, LABELED_TABLE, COL_INDUSTRY)?,
        country: take_text(row, LABELED_TABLE, "Country")?,
        ticker: take_text(row, LABELED_TABLE, COL_TICKER)?,
        document_id: take_text(row, LABELED_TABLE, "Document ID")?,
        headline: take_text(row, LABELED_TABLE, "Headline")?,
        quote: take_text(row, LABELED_TABLE, "Quote")?,
        motivation: take_text(row, LABELED_TABLE, COL_MOTIVATION)?,
        sub_scenario: take_text(row, LABELED_TABLE, "Sub-Scenario")?,
        risk_channel: take_text(row, LABELED_TABLE, "Risk Channel")?,
        risk_factor: take_text(row, LABELED_TABLE, "Risk Factor")?,
        highlights: take_text_list(row, LABELED_TABLE, "Highlights")?,
    })
}

fn take_text(row: &mut Row, table: &'static str, column: &str) -> Result<String, ReportError> {
    match row.take(column) {
        None => Err(ReportError::MissingColumn {
            table,
            column: column.to_string(),
        }),
        Some(CellValue::Text(value)) => Ok(value),
        Some(_) => Err(ReportError::ColumnType {
            table,
            column: column.to_string(),
            expected: "string",
        }),
    }
}

fn take_text_list(
    row: &mut Row,
    table: &'static str,
    column: &str,
) -> Result<Vec<String>, ReportError> {
    match row.take(column) {
        None => Err(ReportError::MissingColumn {
            table,
            column: column.to_string(),
        }),
        Some(CellValue::TextList(values)) => Ok(values),
        Some(CellValue::Null) => Ok(Vec::new()),
        Some(_) => Err(ReportError::ColumnType {
            table,
            column: column.to_string(),
            expected: "list of strings",
        }),
    }
}

/// Remove a numeric cell: `Ok(None)` for NaN, error for non-numeric or
/// non-integral values
fn take_score(
    row: &mut Row,
    company: &str,
    column: &str,
) -> Result<Option<i64>, ReportError> {
    let cell = row.take(column).ok_or_else(|| ReportError::MissingColumn {
        table: COMPANY_TABLE,
        column: column.to_string(),
    })?;
    score_from_cell(cell, company, column)
}

fn score_from_cell(
    cell: CellValue,
    company: &str,
    column: &str,
) -> Result<Option<i64>, ReportError> {
    if cell.is_nan() {
        return Ok(None);
    }
    match cell {
        // The roundtrip check also rejects integral values outside i64
        // range, which `as i64` would silently saturate.
        CellValue::Number(value)
            if value.fract() == 0.0 && value.is_finite() && (value as i64) as f64 == value =>
        {
            Ok(Some(value as i64))
        }
        CellValue::Number(value) => Err(ReportError::NonIntegerScore {
            company: company.to_string(),
            column: column.to_string(),
            value,
        }),
        _ => Err(ReportError::ColumnType {
            table: COMPANY_TABLE,
            column: column.to_string(),
            expected: "number",
        }),
    }
}
