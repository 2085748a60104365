pub mod config;
pub mod request;
pub mod response;
pub mod status;
pub mod table;

pub use config::Config;
pub use request::{
    CompanySelector, DocumentType, Frequency, RiskAnalysisRequest, ValidationError,
};
pub use response::{CompanyScoring, LabeledChunk, RiskAnalysisResponse, RiskTaxonomy};
pub use status::{StatusReport, WorkflowStatus};
pub use table::{CellValue, DataTable, Row};
