use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use parking_lot::Mutex;
use rust_xlsxwriter::Workbook;
use std::io::Cursor;
use std::path::PathBuf;
use std::str::FromStr;
use std::{fs, io};
use thiserror::Error;

use crate::types::{FeatureRecord, FeedbackRecord};

// Canonical column order. Everything that touches the store file or the
// export blob goes through this list.
pub const COLUMNS: [&str; 12] = [
    "Timestamp",
    "Predicted_Time_min",
    "Actual_Time_min",
    "Rating_Kurir",
    "Komentar",
    "Distance_km",
    "Preparation_Time_min",
    "Courier_Experience_yrs",
    "Weather",
    "Traffic_Level",
    "Time_of_Day",
    "Vehicle_Type",
];

pub const SHEET_NAME: &str = "FeedbackData";
pub const EXPORT_FILENAME: &str = "feedback_pengantaran_terkumpul.xlsx";
pub const EXPORT_MIME: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("feedback store '{path}' is corrupt: {reason}")]
    Corrupt { path: String, reason: String },
    #[error("failed to write feedback store: {0}")]
    Write(#[from] io::Error),
    #[error("failed to build feedback workbook: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),
}

/// Append-only log of feedback rows backed by a single xlsx file.
///
/// Reads are lock-free; the append path (read whole file, add row,
/// rewrite) is serialized through a mutex so near-simultaneous
/// submissions cannot drop each other's rows.
pub struct FeedbackStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FeedbackStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// All accepted rows in submission order. A missing file is an empty
    /// table, not an error.
    pub fn load_all(&self) -> Result<Vec<FeedbackRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut workbook: Xlsx<std::io::BufReader<std::fs::File>> =
            open_workbook(&self.path).map_err(|e: calamine::XlsxError| self.corrupt(e.to_string()))?;
        let range = match workbook.worksheet_range_at(0) {
            Some(Ok(range)) => range,
            Some(Err(e)) => return Err(self.corrupt(e.to_string())),
            None => return Err(self.corrupt("workbook has no sheets".into())),
        };
        table_from_range(&range, &self.path.display().to_string())
    }

    /// Read-modify-write under the store's write lock, finished with an
    /// atomic rename. A store that fails to parse aborts the append
    /// before any write; the unreadable file is left untouched.
    pub fn append(&self, record: FeedbackRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let mut rows = self.load_all()?;
        rows.push(record);
        let bytes = export_bytes(&rows)?;
        let tmp = self.path.with_extension("xlsx.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn corrupt(&self, reason: String) -> StoreError {
        StoreError::Corrupt {
            path: self.path.display().to_string(),
            reason,
        }
    }
}

/// Serialize a table into a downloadable xlsx blob. Pure in-memory, no
/// effect on the backing file.
pub fn export_bytes(rows: &[FeedbackRecord]) -> Result<Vec<u8>, StoreError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, name) in COLUMNS.iter().enumerate() {
        sheet.write_string(0, col as u16, *name)?;
    }
    for (i, rec) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        sheet.write_string(row, 0, &rec.timestamp)?;
        sheet.write_number(row, 1, rec.predicted_time_min)?;
        sheet.write_number(row, 2, f64::from(rec.actual_time_min))?;
        sheet.write_number(row, 3, f64::from(rec.rating_kurir))?;
        sheet.write_string(row, 4, &rec.komentar)?;
        sheet.write_number(row, 5, rec.features.distance_km)?;
        sheet.write_number(row, 6, f64::from(rec.features.preparation_time_min))?;
        sheet.write_number(row, 7, rec.features.courier_experience_yrs)?;
        sheet.write_string(row, 8, rec.features.weather.as_str())?;
        sheet.write_string(row, 9, rec.features.traffic_level.as_str())?;
        sheet.write_string(row, 10, rec.features.time_of_day.as_str())?;
        sheet.write_string(row, 11, rec.features.vehicle_type.as_str())?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Parse an xlsx blob back into a table (the export round-trip).
pub fn parse_bytes(bytes: &[u8]) -> Result<Vec<FeedbackRecord>, StoreError> {
    let mut workbook = Xlsx::new(Cursor::new(bytes)).map_err(|e| StoreError::Corrupt {
        path: "<in-memory>".into(),
        reason: e.to_string(),
    })?;
    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => {
            return Err(StoreError::Corrupt {
                path: "<in-memory>".into(),
                reason: e.to_string(),
            })
        }
        None => {
            return Err(StoreError::Corrupt {
                path: "<in-memory>".into(),
                reason: "workbook has no sheets".into(),
            })
        }
    };
    table_from_range(&range, "<in-memory>")
}

// ---------- Row decoding ----------

fn table_from_range(
    range: &Range<Data>,
    source: &str,
) -> Result<Vec<FeedbackRecord>, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        path: source.to_string(),
        reason,
    };

    let mut rows = range.rows();
    let header = rows.next().ok_or_else(|| corrupt("missing header row".into()))?;
    let header: Vec<String> = header.iter().map(cell_string).collect();
    if header != COLUMNS {
        return Err(corrupt(format!("unexpected header {:?}", header)));
    }

    let mut table = Vec::new();
    for (i, row) in rows.enumerate() {
        let line = i + 2; // 1-based, after the header
        if row.len() < COLUMNS.len() {
            return Err(corrupt(format!("row {} has {} cells", line, row.len())));
        }
        let record = FeedbackRecord {
            timestamp: cell_string(&row[0]),
            predicted_time_min: cell_f64(&row[1])
                .ok_or_else(|| corrupt(format!("row {}: bad Predicted_Time_min", line)))?,
            actual_time_min: cell_u32(&row[2])
                .ok_or_else(|| corrupt(format!("row {}: bad Actual_Time_min", line)))?,
            rating_kurir: cell_u32(&row[3])
                .and_then(|v| u8::try_from(v).ok())
                .ok_or_else(|| corrupt(format!("row {}: bad Rating_Kurir", line)))?,
            komentar: cell_string(&row[4]),
            features: FeatureRecord {
                distance_km: cell_f64(&row[5])
                    .ok_or_else(|| corrupt(format!("row {}: bad Distance_km", line)))?,
                preparation_time_min: cell_u32(&row[6]).ok_or_else(|| {
                    corrupt(format!("row {}: bad Preparation_Time_min", line))
                })?,
                courier_experience_yrs: cell_f64(&row[7]).ok_or_else(|| {
                    corrupt(format!("row {}: bad Courier_Experience_yrs", line))
                })?,
                weather: parse_cell(&row[8], line, &corrupt)?,
                traffic_level: parse_cell(&row[9], line, &corrupt)?,
                time_of_day: parse_cell(&row[10], line, &corrupt)?,
                vehicle_type: parse_cell(&row[11], line, &corrupt)?,
            },
        };
        table.push(record);
    }
    Ok(table)
}

fn parse_cell<T: FromStr<Err = String>>(
    cell: &Data,
    line: usize,
    corrupt: &impl Fn(String) -> StoreError,
) -> Result<T, StoreError> {
    cell_string(cell)
        .parse()
        .map_err(|e: String| corrupt(format!("row {}: {}", line, e)))
}

fn cell_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn cell_f64(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn cell_u32(cell: &Data) -> Option<u32> {
    let f = cell_f64(cell)?;
    if f.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&f) {
        Some(f as u32)
    } else {
        None
    }
}
