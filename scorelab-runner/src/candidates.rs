//! Candidate table ingestion (CSV).
//!
//! Recognized columns, case-insensitive:
//! - `ticker` or `symbol` (required)
//! - `composite_score` or `score` (one required; `composite_score` wins if both exist)
//! - `tier` (optional display label)
//! - `timing_convergence` (optional: true/false, 1/0, yes/no; empty means false)
//!
//! Rows that fail validation are skipped with a warning and counted.

use scorelab_core::domain::{Candidate, Score, ScoreScale};
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("failed to open candidate table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("candidate table has no '{0}' column")]
    MissingColumn(&'static str),

    #[error("candidate table has no data rows")]
    Empty,
}

/// A row that was skipped during ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    /// 1-based line number in the source, header included.
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct CandidateTable {
    pub candidates: Vec<Candidate>,
    pub rejected: Vec<RejectedRow>,
}

impl From<Vec<Candidate>> for CandidateTable {
    fn from(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            rejected: Vec::new(),
        }
    }
}

struct Columns {
    ticker: usize,
    score: usize,
    scale: ScoreScale,
    tier: Option<usize>,
    timing: Option<usize>,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self, CandidateError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let ticker = find("ticker")
            .or_else(|| find("symbol"))
            .ok_or(CandidateError::MissingColumn("ticker"))?;
        let (score, scale) = match (find("composite_score"), find("score")) {
            (Some(i), _) => (i, ScoreScale::Composite),
            (None, Some(i)) => (i, ScoreScale::Raw),
            (None, None) => return Err(CandidateError::MissingColumn("composite_score")),
        };
        Ok(Self {
            ticker,
            score,
            scale,
            tier: find("tier"),
            timing: find("timing_convergence"),
        })
    }

    fn parse(&self, record: &csv::StringRecord) -> Result<Candidate, String> {
        let field = |i: usize| record.get(i).map(str::trim).unwrap_or("");

        let ticker = field(self.ticker);
        let raw_score = field(self.score);
        let value: f64 = raw_score
            .parse()
            .map_err(|_| format!("unparsable {} '{raw_score}'", self.scale.column_name()))?;
        let score = match self.scale {
            ScoreScale::Composite => Score::composite(value),
            ScoreScale::Raw => Score::raw(value),
        };
        let tier = self.tier.map(field).unwrap_or("");
        let timing = match self.timing.map(field) {
            None => false,
            Some(s) => parse_flag(s).ok_or_else(|| format!("unparsable timing_convergence '{s}'"))?,
        };

        Candidate::new(ticker, score, tier, timing).map_err(|e| e.to_string())
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" | "n" => Some(false),
        "true" | "1" | "yes" | "y" => Some(true),
        _ => None,
    }
}

/// Read a candidate table from any CSV source.
pub fn read_candidates<R: io::Read>(reader: R) -> Result<CandidateTable, CandidateError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let columns = Columns::locate(rdr.headers()?)?;

    let mut table = CandidateTable::default();
    let mut rows = 0usize;
    for record in rdr.records() {
        let record = record?;
        rows += 1;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        match columns.parse(&record) {
            Ok(candidate) => table.candidates.push(candidate),
            Err(reason) => {
                tracing::warn!(line, reason = %reason, "skipping candidate row");
                table.rejected.push(RejectedRow { line, reason });
            }
        }
    }

    if rows == 0 {
        return Err(CandidateError::Empty);
    }
    tracing::info!(
        accepted = table.candidates.len(),
        rejected = table.rejected.len(),
        scale = columns.scale.column_name(),
        "loaded candidates"
    );
    Ok(table)
}

pub fn load_candidates(path: &Path) -> Result<CandidateTable, CandidateError> {
    let file = std::fs::File::open(path).map_err(|source| CandidateError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_candidates(io::BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scorelab_core::domain::Tier;

    #[test]
    fn composite_score_table() {
        let csv = "ticker,composite_score,tier,timing_convergence\n\
                   AAPL,72.5,🔥 ELITE,true\n\
                   msft,58,Strong,0\n\
                   NVDA,61,,\n";
        let table = read_candidates(csv.as_bytes()).unwrap();
        assert_eq!(table.candidates.len(), 3);
        assert!(table.rejected.is_empty());

        let aapl = &table.candidates[0];
        assert_eq!(aapl.score, Score::composite(72.5));
        assert_eq!(aapl.tier, Tier::Elite);
        assert!(aapl.timing_convergence);
        assert_eq!(table.candidates[1].ticker, "MSFT");
        assert!(!table.candidates[1].timing_convergence);
        assert_eq!(table.candidates[2].tier, Tier::Unrated);
    }

    #[test]
    fn raw_score_table_with_symbol_column() {
        let csv = "Symbol,Score,Tier\nAMD,44,GOOD\n";
        let table = read_candidates(csv.as_bytes()).unwrap();
        assert_eq!(table.candidates[0].score, Score::raw(44.0));
        assert!(!table.candidates[0].timing_convergence);
    }

    #[test]
    fn bad_rows_are_rejected_not_fatal() {
        let csv = "ticker,score,tier,timing_convergence\n\
                   ,50,GOOD,no\n\
                   TSLA,abc,GOOD,no\n\
                   META,NaN,GOOD,no\n\
                   AMZN,55,GOOD,maybe\n\
                   GOOG,51,GOOD,yes\n";
        let table = read_candidates(csv.as_bytes()).unwrap();
        assert_eq!(table.candidates.len(), 1);
        assert_eq!(table.candidates[0].ticker, "GOOG");
        assert_eq!(table.rejected.len(), 4);
        assert_eq!(table.rejected[0].line, 2);
        assert!(table.rejected[1].reason.contains("score"));
    }

    #[test]
    fn structural_errors() {
        assert!(matches!(
            read_candidates("ticker,tier\nAAPL,GOOD\n".as_bytes()),
            Err(CandidateError::MissingColumn("composite_score"))
        ));
        assert!(matches!(
            read_candidates("name,score\nAAPL,50\n".as_bytes()),
            Err(CandidateError::MissingColumn("ticker"))
        ));
        assert!(matches!(
            read_candidates("ticker,score\n".as_bytes()),
            Err(CandidateError::Empty)
        ));
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candidates.csv");
        std::fs::write(&path, "ticker,composite_score\nSPY,60\n").unwrap();
        let table = load_candidates(&path).unwrap();
        assert_eq!(table.candidates.len(), 1);
        assert!(matches!(
            load_candidates(&dir.path().join("missing.csv")),
            Err(CandidateError::Io { .. })
        ));
    }
}
