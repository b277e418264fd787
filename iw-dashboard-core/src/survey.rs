//! Survey ID export: the contest-wide users CSV joined with a survey file by email.
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use iw_dashboard_common::{DashboardError, Result};
use std::collections::HashMap;
use std::path::Path;

/// Backend file name for the contest export.
pub const CONTEST_EXPORT_FILE: &str = "users_agg.csv";
pub const SURVEY_EXPORT_FILE: &str = "users_agg_with_ids.csv";
pub const SURVEY_ID_HEADER: &str = "Survey ID";

/// Zero-based positions of the email and ID columns in the survey header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurveyColumns {
    pub email: usize,
    pub id: usize,
}

#[derive(Debug, Clone)]
pub struct SurveyUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub columns: SurveyColumns,
}

impl SurveyUpload {
    /// Columns are picked by header name (case-insensitive) or by index.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>, email: &str, id: &str) -> Result<Self> {
        let headers = survey_headers(&bytes)?;
        let columns = SurveyColumns { email: resolve_column(&headers, email)?, id: resolve_column(&headers, id)? };
        if columns.email == columns.id {
            return Err(DashboardError::InvalidInput("email and ID must be different columns".into()));
        }
        Ok(Self { file_name: file_name.into(), bytes, columns })
    }

    pub fn from_path(path: &Path, email: &str, id: &str) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "survey.csv".into());
        Self::new(file_name, bytes, email, id)
    }
}

fn csv_error(e: csv::Error) -> DashboardError {
    DashboardError::InvalidInput(format!("csv: {e}"))
}

/// First row of the survey file.
pub fn survey_headers(bytes: &[u8]) -> Result<Vec<String>> {
    let mut rdr = ReaderBuilder::new().has_headers(false).flexible(true).from_reader(bytes);
    let mut record = StringRecord::new();
    if !rdr.read_record(&mut record).map_err(csv_error)? {
        return Err(DashboardError::InvalidInput("survey file is empty".into()));
    }
    Ok(record.iter().map(|h| h.trim().to_owned()).collect())
}

pub fn resolve_column(headers: &[String], wanted: &str) -> Result<usize> {
    let wanted = wanted.trim();
    if let Some(i) = headers.iter().position(|h| h.eq_ignore_ascii_case(wanted)) {
        return Ok(i);
    }
    match wanted.parse::<usize>() {
        Ok(i) if i < headers.len() => Ok(i),
        _ => Err(DashboardError::InvalidInput(format!(
            "no column {wanted:?} in survey header ({})",
            headers.join(", ")
        ))),
    }
}

fn email_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Append a `Survey ID` column to `export`, matching rows on the `Email` column.
///
/// Rows without a survey match get an empty ID. The first survey row wins on duplicates.
pub fn merge_survey_ids(export: &[u8], survey: &[u8], columns: SurveyColumns) -> Result<Vec<u8>> {
    let mut ids: HashMap<String, String> = HashMap::new();
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(survey);
    for record in rdr.records() {
        let record = record.map_err(csv_error)?;
        if let (Some(email), Some(id)) = (record.get(columns.email), record.get(columns.id)) {
            let key = email_key(email);
            if !key.is_empty() {
                ids.entry(key).or_insert_with(|| id.trim().to_owned());
            }
        }
    }

    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(export);
    let mut header = rdr.headers().map_err(csv_error)?.clone();
    let email_idx = header
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("email"))
        .ok_or_else(|| DashboardError::InvalidInput("contest export has no Email column".into()))?;
    header.push_field(SURVEY_ID_HEADER);

    let mut out = WriterBuilder::new().flexible(true).from_writer(Vec::new());
    out.write_record(&header).map_err(csv_error)?;
    let mut matched = 0usize;
    for record in rdr.records() {
        let mut record = record.map_err(csv_error)?;
        let id = record
            .get(email_idx)
            .and_then(|e| ids.get(&email_key(e)))
            .cloned()
            .unwrap_or_default();
        if !id.is_empty() {
            matched += 1;
        }
        record.push_field(&id);
        out.write_record(&record).map_err(csv_error)?;
    }
    tracing::debug!(matched, survey_rows = ids.len(), "merged survey ids");
    out.into_inner().map_err(|e| DashboardError::Io(e.into_error()))
}
