//! CSV catalog ingest.
//!
//! Expected columns, matched case-insensitively:
//! - `<name>` and `<name>_err` for every observable in the config
//! - optional `id`
//!
//! Value cells:
//! - empty, `nan` or `na`: not measured
//! - `below` or `<`: below the detection threshold
//! - `-1` in a non-normalized column: below threshold (legacy encoding)
//!
//! Only non-normalized observables may be missing or below threshold; such a
//! value in a normalized column makes the row an error.
//!
//! Rows that fail to parse are skipped and reported, like the rest of the
//! ingest layer; a catalog with no usable rows is an error.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::StringRecord;

use crate::domain::{Catalog, ClusterConfig, Measurement, Star};
use crate::error::AppError;

/// Legacy below-threshold value of boundary observables.
const LEGACY_BELOW: f64 = -1.0;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct LoadedCatalog {
    pub catalog: Catalog,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load a catalog CSV for the observables named in `config`.
pub fn read_catalog_csv(path: &Path, config: &ClusterConfig) -> Result<LoadedCatalog, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open catalog CSV '{}': {e}", path.display())))?;
    let loaded = parse_catalog(file, config).map_err(|e| e.context(path.display()))?;
    log::info!(
        "loaded {} stars from {} ({} rows skipped)",
        loaded.catalog.len(),
        path.display(),
        loaded.row_errors.len()
    );
    Ok(loaded)
}

pub fn parse_catalog<R: Read>(reader: R, config: &ClusterConfig) -> Result<LoadedCatalog, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::io(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    let columns = resolve_columns(&header_map, config)?;
    let id_col = header_map.get("id").copied();

    let mut stars = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let id = id_col
            .and_then(|c| record.get(c))
            .filter(|s| !s.is_empty())
            .map_or_else(|| format!("row{}", idx + 1), str::to_string);

        match parse_row(&record, &columns, config) {
            Ok((values, errors)) => stars.push(Star { id, values, errors }),
            Err(message) => {
                log::warn!("line {line} ({id}): {message}");
                row_errors.push(RowError {
                    line,
                    id: Some(id),
                    message,
                });
            }
        }
    }

    if stars.is_empty() {
        return Err(AppError::invalid("No valid rows in catalog."));
    }

    Ok(LoadedCatalog {
        catalog: Catalog {
            observables: config.observables.clone(),
            stars,
        },
        row_errors,
        rows_read,
    })
}

/// Write a catalog in the format [`parse_catalog`] reads.
pub fn write_catalog_csv(path: &Path, catalog: &Catalog) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create catalog CSV '{}': {e}", path.display())))?;
    write_catalog(file, catalog)
}

fn write_catalog<W: Write>(out: W, catalog: &Catalog) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    let mut header = vec!["id".to_string()];
    for name in &catalog.observables {
        header.push(name.clone());
        header.push(format!("{name}_err"));
    }
    writer
        .write_record(&header)
        .map_err(|e| AppError::io(format!("Failed to write catalog CSV header: {e}")))?;

    for star in &catalog.stars {
        let mut row = vec![star.id.clone()];
        for (value, err) in star.values.iter().zip(&star.errors) {
            row.push(match value {
                Measurement::Present(v) => v.to_string(),
                Measurement::Absent => String::new(),
                Measurement::BelowThreshold => "below".to_string(),
            });
            row.push(if err.is_finite() { err.to_string() } else { String::new() });
        }
        writer
            .write_record(&row)
            .map_err(|e| AppError::io(format!("Failed to write catalog CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush catalog CSV: {e}")))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

/// Value and error column indices per observable.
fn resolve_columns(header_map: &HashMap<String, usize>, config: &ClusterConfig) -> Result<Vec<(usize, usize)>, AppError> {
    config
        .observables
        .iter()
        .map(|name| -> Result<(usize, usize), AppError> {
            let key = name.to_ascii_lowercase();
            let value = header_map
                .get(&key)
                .ok_or_else(|| AppError::invalid(format!("Missing required column: `{name}`")))?;
            let err = header_map
                .get(&format!("{key}_err"))
                .ok_or_else(|| AppError::invalid(format!("Missing required column: `{name}_err`")))?;
            Ok((*value, *err))
        })
        .collect()
}

fn parse_row(
    record: &StringRecord,
    columns: &[(usize, usize)],
    config: &ClusterConfig,
) -> Result<(Vec<Measurement>, Vec<f64>), String> {
    let mut values = Vec::with_capacity(columns.len());
    let mut errors = Vec::with_capacity(columns.len());

    for (k, &(vc, ec)) in columns.iter().enumerate() {
        let name = &config.observables[k];
        let value = parse_measurement(record.get(vc).unwrap_or(""), !config.norm[k])
            .map_err(|e| format!("`{name}`: {e}"))?;
        // Only the boundary observable has grid variants for missing values.
        if config.norm[k] && value.value().is_none() {
            return Err(format!("`{name}` must be measured on a normalized axis."));
        }
        let err = match value {
            Measurement::Present(_) => {
                let err = parse_opt_f64(record.get(ec).unwrap_or(""))
                    .map_err(|e| format!("`{name}_err`: {e}"))?
                    .ok_or_else(|| format!("`{name}` is present but `{name}_err` is missing."))?;
                if err < 0.0 {
                    return Err(format!("`{name}_err` must be >= 0, got {err}."));
                }
                err
            }
            // The error of a value we never evaluate at is irrelevant.
            Measurement::Absent | Measurement::BelowThreshold => f64::NAN,
        };
        values.push(value);
        errors.push(err);
    }

    Ok((values, errors))
}

fn parse_measurement(raw: &str, boundary: bool) -> Result<Measurement, String> {
    if raw == "<" || raw.eq_ignore_ascii_case("below") {
        return Ok(Measurement::BelowThreshold);
    }
    match parse_opt_f64(raw)? {
        None => Ok(Measurement::Absent),
        Some(v) if boundary && v == LEGACY_BELOW => Ok(Measurement::BelowThreshold),
        Some(v) => Ok(Measurement::Present(v)),
    }
}

/// Empty, `nan` and `na` read as missing.
fn parse_opt_f64(raw: &str) -> Result<Option<f64>, String> {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("na") {
        return Ok(None);
    }
    let v: f64 = s.parse().map_err(|_| format!("invalid number '{s}'"))?;
    if !v.is_finite() {
        return Err(format!("non-finite number '{s}'"));
    }
    Ok(Some(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\u{feff}ID,mag,mag_err,col,col_err,vsini,vsini_err\n\
                       a,20.5,0.02,0.7,0.03,120,15\n\
                       b,20.6,0.02,0.7,0.03,,\n\
                       c,20.7,0.02,0.7,0.03,-1,\n\
                       d,20.8,0.02,0.7,0.03,below,\n\
                       e,20.9,0.02,oops,0.03,100,10\n\
                       ,21.0,0.02,0.8,0.03,NaN,NA\n";

    #[test]
    fn sentinels_become_measurement_variants() {
        let loaded = parse_catalog(CSV.as_bytes(), &ClusterConfig::default()).unwrap();
        let stars = &loaded.catalog.stars;
        assert_eq!(loaded.rows_read, 6);
        assert_eq!(stars.len(), 5);

        assert_eq!(stars[0].id, "a");
        assert_eq!(stars[0].values[2], Measurement::Present(120.0));
        assert_eq!(stars[0].errors, vec![0.02, 0.03, 15.0]);
        assert_eq!(stars[1].values[2], Measurement::Absent);
        assert_eq!(stars[2].values[2], Measurement::BelowThreshold);
        assert_eq!(stars[3].values[2], Measurement::BelowThreshold);
        assert_eq!(stars[4].id, "row6");
        assert_eq!(stars[4].values[2], Measurement::Absent);
    }

    #[test]
    fn bad_rows_are_reported_not_fatal() {
        let loaded = parse_catalog(CSV.as_bytes(), &ClusterConfig::default()).unwrap();
        assert_eq!(loaded.row_errors.len(), 1);
        let e = &loaded.row_errors[0];
        assert_eq!(e.line, 6);
        assert_eq!(e.id.as_deref(), Some("e"));
        assert!(e.message.contains("`col`"), "{}", e.message);
    }

    #[test]
    fn minus_one_is_an_ordinary_value_on_normalized_axes() {
        let csv = "mag,mag_err,col,col_err,vsini,vsini_err\n20.5,0.02,-1,0.03,50,10\n";
        let loaded = parse_catalog(csv.as_bytes(), &ClusterConfig::default()).unwrap();
        assert_eq!(loaded.catalog.stars[0].values[1], Measurement::Present(-1.0));
    }

    #[test]
    fn missing_error_column_is_a_schema_error() {
        let csv = "mag,mag_err,col,vsini,vsini_err\n20.5,0.02,0.7,50,10\n";
        let err = parse_catalog(csv.as_bytes(), &ClusterConfig::default()).unwrap_err();
        assert!(err.message().contains("col_err"));
    }

    #[test]
    fn written_catalog_reads_back() {
        let cfg = ClusterConfig::default();
        let original = parse_catalog(CSV.as_bytes(), &cfg).unwrap().catalog;
        let mut buf = Vec::new();
        write_catalog(&mut buf, &original).unwrap();
        let back = parse_catalog(buf.as_slice(), &cfg).unwrap().catalog;
        assert_eq!(back.len(), original.len());
        for (a, b) in back.stars.iter().zip(&original.stars) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.values, b.values);
        }
    }

    #[test]
    fn present_value_without_error_is_rejected() {
        let csv = "mag,mag_err,col,col_err,vsini,vsini_err\n20.5,,0.7,0.03,50,10\n20.5,0.02,0.7,0.03,50,10\n";
        let loaded = parse_catalog(csv.as_bytes(), &ClusterConfig::default()).unwrap();
        assert_eq!(loaded.catalog.len(), 1);
        assert!(loaded.row_errors[0].message.contains("mag_err"));
    }

    #[test]
    fn missing_normalized_value_is_a_row_error() {
        let csv = "id,mag,mag_err,col,col_err,vsini,vsini_err\n\
                   good,20.5,0.02,0.7,0.03,50,10\n\
                   blank,,,0.7,0.03,50,10\n\
                   faint,20.5,0.02,below,,50,10\n";
        let loaded = parse_catalog(csv.as_bytes(), &ClusterConfig::default()).unwrap();
        assert_eq!(loaded.catalog.len(), 1);
        assert_eq!(loaded.catalog.stars[0].id, "good");
        let ids: Vec<_> = loaded.row_errors.iter().map(|e| e.id.as_deref()).collect();
        assert_eq!(ids, vec![Some("blank"), Some("faint")]);
        assert!(loaded.row_errors[0].message.contains("`mag`"));
        assert!(loaded.row_errors[1].message.contains("`col`"));
    }
}
