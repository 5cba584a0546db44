//! File-backed data access: per-ticker CSV price histories, JSON financial
//! statements and the CSV metric tables the commands exchange.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use analysis_core::{AnalysisError, FinancialDataProvider, FinancialStatements, PriceBar};
use analysis_orchestrator::MetricsTable;
use backtest_engine::MarketRow;
use chrono::NaiveDate;
use serde::Serialize;

/// Reads `historical_<TICKER>.csv` and `financials_<TICKER>.json` from a
/// data directory.
#[derive(Debug, Clone)]
pub struct CsvDataProvider {
    data_dir: PathBuf,
}

impl CsvDataProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn history_path(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("historical_{}.csv", symbol))
    }

    pub fn financials_path(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("financials_{}.json", symbol))
    }

    /// Full history with any extra numeric columns, sorted by date.
    pub fn load_market_rows(&self, symbol: &str) -> Result<Vec<MarketRow>, AnalysisError> {
        let path = self.history_path(symbol);
        let file = open(&path)?;
        let mut rows = read_market_rows(file)
            .map_err(|e| with_path(e, &path))?;
        rows.sort_by_key(|r| r.date);
        Ok(rows)
    }
}

impl FinancialDataProvider for CsvDataProvider {
    fn get_financial_statements(&self, symbol: &str) -> Result<FinancialStatements, AnalysisError> {
        let path = self.financials_path(symbol);
        let file = open(&path)?;
        serde_json::from_reader(io::BufReader::new(file)).map_err(|e| {
            AnalysisError::InvalidData(format!("{}: {}", path.display(), e))
        })
    }

    fn get_latest_price(&self, symbol: &str) -> Result<f64, AnalysisError> {
        self.load_market_rows(symbol)?
            .last()
            .map(|r| r.close)
            .ok_or_else(|| {
                AnalysisError::InsufficientData(format!("No price history for {}", symbol))
            })
    }

    fn get_price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, AnalysisError> {
        Ok(self
            .load_market_rows(symbol)?
            .into_iter()
            .filter(|r| r.date >= start && r.date <= end)
            .map(|r| PriceBar {
                date: r.date,
                open: r.open,
                high: r.high,
                low: r.low,
                close: r.close,
                volume: r.volume,
            })
            .collect())
    }
}

/// Parse an OHLCV CSV. Column names are matched case-insensitively; columns
/// other than Date/Open/High/Low/Close/Volume become extra fields named in
/// snake case (`PE Ratio` -> `pe_ratio`). Blank or non-numeric extra cells
/// are left out.
pub fn read_market_rows<R: Read>(reader: R) -> Result<Vec<MarketRow>, AnalysisError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(field_name)
        .collect();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let date_idx = column("date")
        .ok_or_else(|| AnalysisError::InvalidData("missing 'Date' column".to_string()))?;
    let close_idx = column("close")
        .ok_or_else(|| AnalysisError::InvalidData("missing 'Close' column".to_string()))?;
    let open_idx = column("open");
    let high_idx = column("high");
    let low_idx = column("low");
    let volume_idx = column("volume");

    let known = [Some(date_idx), Some(close_idx), open_idx, high_idx, low_idx, volume_idx];
    let extra_columns: Vec<(usize, &String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| !known.contains(&Some(*i)))
        .collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(csv_error)?;
        let line = line + 2;
        let cell = |idx: usize| record.get(idx).map(str::trim).unwrap_or("");
        let number = |idx: Option<usize>| idx.and_then(|i| cell(i).parse::<f64>().ok());

        let raw_date = cell(date_idx);
        // Timestamps such as "2020-01-02 00:00:00-05:00" keep only the day.
        let date = NaiveDate::parse_from_str(raw_date.get(..10).unwrap_or(raw_date), "%Y-%m-%d")
            .map_err(|e| {
                AnalysisError::InvalidData(format!("line {}: bad date '{}': {}", line, raw_date, e))
            })?;
        let close = number(Some(close_idx)).ok_or_else(|| {
            AnalysisError::InvalidData(format!("line {}: missing close", line))
        })?;

        let extra = extra_columns
            .iter()
            .filter_map(|&(i, name)| cell(i).parse::<f64>().ok().map(|v| (name.clone(), v)))
            .collect();

        rows.push(MarketRow {
            date,
            open: number(open_idx).unwrap_or(close),
            high: number(high_idx).unwrap_or(close),
            low: number(low_idx).unwrap_or(close),
            close,
            volume: number(volume_idx).unwrap_or(0.0),
            extra,
        });
    }
    Ok(rows)
}

/// Load a metrics CSV keyed by `Ticker` or `Symbol`.
pub fn read_metrics_table(path: &Path) -> Result<MetricsTable, AnalysisError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(open(path)?);

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let rows = reader
        .records()
        .map(|r| r.map(|rec| rec.iter().map(str::to_string).collect()))
        .collect::<Result<Vec<Vec<String>>, _>>()
        .map_err(csv_error)?;

    MetricsTable::from_raw(&headers, rows).map_err(|e| with_path(e, path))
}

pub fn write_metrics_table(path: &Path, table: &MetricsTable) -> Result<(), AnalysisError> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    writer.write_record(table.headers()).map_err(csv_error)?;
    for row in table.to_rows() {
        writer.write_record(row).map_err(csv_error)?;
    }
    writer.flush().map_err(io_error)
}

/// Write serializable records (one struct per row) with a header line.
/// `columns` must match the serialized field names; it is written directly
/// when there are no records to derive the header from.
pub fn write_records<T: Serialize>(
    path: &Path,
    columns: &[&str],
    records: &[T],
) -> Result<(), AnalysisError> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    if records.is_empty() {
        writer.write_record(columns).map_err(csv_error)?;
    }
    for record in records {
        writer.serialize(record).map_err(csv_error)?;
    }
    writer.flush().map_err(io_error)
}

fn field_name(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

fn open(path: &Path) -> Result<File, AnalysisError> {
    File::open(path).map_err(|e| with_path(io_error(e), path))
}

/// Transient I/O conditions are worth retrying; everything else is not.
fn io_error(e: io::Error) -> AnalysisError {
    match e.kind() {
        io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            AnalysisError::ProviderError(e.to_string())
        }
        _ => AnalysisError::StorageError(e.to_string()),
    }
}

fn csv_error(e: csv::Error) -> AnalysisError {
    if e.is_io_error() {
        if let csv::ErrorKind::Io(io) = e.into_kind() {
            return io_error(io);
        }
        return AnalysisError::StorageError("I/O error".to_string());
    }
    AnalysisError::InvalidData(e.to_string())
}

fn with_path(e: AnalysisError, path: &Path) -> AnalysisError {
    let p = path.display();
    match e {
        AnalysisError::StorageError(m) => AnalysisError::StorageError(format!("{}: {}", p, m)),
        AnalysisError::ProviderError(m) => AnalysisError::ProviderError(format!("{}: {}", p, m)),
        AnalysisError::InvalidData(m) => AnalysisError::InvalidData(format!("{}: {}", p, m)),
        AnalysisError::ValidationError(m) => {
            AnalysisError::ValidationError(format!("{}: {}", p, m))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::LineItem;
    use backtest_engine::PerformanceMetrics;
    use std::fs;

    const HISTORY: &str = "\
Date,Open,High,Low,Close,Volume,PE Ratio,pb_ratio
2023-01-04 00:00:00-05:00,101,103,100,102,1000,14.5,1.2
2023-01-03,99,101,98,100,1200,,1.1
2023-01-05,102,104,101,103,900,15.5,n/a
";

    fn data_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("historical_KO.csv"), HISTORY).unwrap();
        fs::write(
            dir.path().join("financials_KO.json"),
            r#"{
                "income_statement": [
                    {"period_end": "2023-12-31", "Total Revenue": 45000, "EPS": 2.5, "Net Income": 10700},
                    {"period_end": "2022-12-31", "Total Revenue": 43000, "EPS": 2.2, "Net Income": 9500}
                ],
                "balance_sheet": [
                    {"period_end": "2023-12-31", "Total Debt": null, "Book Value per Share": 6.0}
                ]
            }"#,
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_read_market_rows() {
        let rows = read_market_rows(HISTORY.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2023, 1, 4).unwrap());
        assert_eq!(rows[0].field("pe_ratio"), Some(14.5));
        assert_eq!(rows[0].field("pb_ratio"), Some(1.2));
        assert_eq!(rows[1].field("pe_ratio"), None);
        assert_eq!(rows[2].field("pb_ratio"), None);
        assert_eq!(rows[2].volume, 900.0);
    }

    #[test]
    fn test_missing_close_column() {
        let result = read_market_rows("Date,Open\n2023-01-03,1\n".as_bytes());
        assert!(matches!(result, Err(AnalysisError::InvalidData(_))));
    }

    #[test]
    fn test_bad_date_names_the_line() {
        let err = read_market_rows("Date,Close\n2023-01-03,1\nyesterday,2\n".as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_provider_reads_files() {
        let dir = data_dir();
        let provider = CsvDataProvider::new(dir.path());

        // Latest price is the close of the most recent row, not the last line.
        assert_eq!(provider.get_latest_price("KO").unwrap(), 103.0);

        let history = provider
            .get_price_history(
                "KO",
                NaiveDate::from_ymd_opt(2023, 1, 4).unwrap(),
                NaiveDate::from_ymd_opt(2023, 1, 31).unwrap(),
            )
            .unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].date < history[1].date);

        let statements = provider.get_financial_statements("KO").unwrap();
        assert_eq!(statements.income_statement.len(), 2);
        assert_eq!(
            statements.income_statement.latest().and_then(|p| p.get(LineItem::Eps)),
            Some(2.5)
        );
        assert_eq!(
            statements.balance_sheet.latest().and_then(|p| p.get(LineItem::TotalDebt)),
            None
        );
        assert!(statements.cash_flow.is_empty());
    }

    #[test]
    fn test_missing_files_are_storage_errors() {
        let dir = data_dir();
        let provider = CsvDataProvider::new(dir.path());
        let err = provider.get_latest_price("NOPE").unwrap_err();
        assert!(matches!(err, AnalysisError::StorageError(_)));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("historical_NOPE.csv"));
    }

    #[test]
    fn test_metrics_table_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("value_metrics.csv");
        fs::write(&path, "Symbol,P/E Ratio,Dividend Yield\nKO,22.1,0.03\nBAC,,0.025\n").unwrap();

        let table = read_metrics_table(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.value("KO", "P/E Ratio"), Some(22.1));
        assert_eq!(table.value("BAC", "P/E Ratio"), None);

        let out = dir.path().join("out.csv");
        write_metrics_table(&out, &table).unwrap();
        let written = fs::read_to_string(&out).unwrap();
        assert!(written.starts_with("Ticker,P/E Ratio,Dividend Yield\n"));
        assert!(written.contains("BAC,,0.025"));
    }

    #[test]
    fn test_empty_records_still_write_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("performance_metrics.csv");

        write_records::<PerformanceMetrics>(&path, &PerformanceMetrics::COLUMNS, &[]).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, "Ticker,Annual Return,Volatility,Sharpe Ratio,Max Drawdown\n");

        let table = read_metrics_table(&path).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.headers(), PerformanceMetrics::COLUMNS);
    }

    #[test]
    fn test_columns_match_serialized_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("performance_metrics.csv");
        let record = PerformanceMetrics {
            ticker: "KO".to_string(),
            annual_return: 0.08,
            volatility: 0.15,
            sharpe_ratio: 0.5,
            max_drawdown: -0.2,
        };

        write_records(&path, &PerformanceMetrics::COLUMNS, &[record]).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().next(), Some(PerformanceMetrics::COLUMNS.join(",").as_str()));
    }
}
