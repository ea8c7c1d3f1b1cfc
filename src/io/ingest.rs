//! Spectrum file ingest.
//!
//! Two input formats:
//!
//! - **ASCII**: two columns `wavelength intensity`, separated by whitespace,
//!   tabs, commas or semicolons. `#` comment lines, blank lines and one
//!   leading non-numeric header line are skipped.
//! - **JSON** (`.json`): a `RawPayload` document, i.e. one spectrum object or
//!   an array of them (a series sharing one acquisition).
//!
//! The measurement name is the file stem. Validation beyond "is it a number"
//! happens when the payload becomes a `Measurement`.

use std::fs;
use std::path::Path;

use log::info;

use crate::collection::MeasurementCollection;
use crate::domain::{DetectorConfig, RawPayload, RawSpectrum};
use crate::error::{AppError, EXIT_IO};

/// One loaded input file.
#[derive(Debug, Clone)]
pub struct IngestedFile {
    pub name: String,
    pub payload: RawPayload,
}

/// Name used for a file's measurement: its stem (`run_07.txt` -> `run_07`).
pub fn measurement_name(path: &Path) -> Result<String, AppError> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::new(EXIT_IO, format!("Cannot derive a name from '{}'.", path.display())))
}

/// Read one input file, choosing the format by extension.
pub fn read_input(path: &Path) -> Result<IngestedFile, AppError> {
    let name = measurement_name(path)?;
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::new(EXIT_IO, format!("Failed to read '{}': {e}", path.display())))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let payload = if is_json {
        serde_json::from_str(&text)
            .map_err(|e| AppError::new(EXIT_IO, format!("Invalid spectrum JSON '{}': {e}", path.display())))?
    } else {
        RawPayload::Single(
            parse_ascii(&text).map_err(|e| AppError::new(EXIT_IO, format!("{}: {e}", path.display())))?,
        )
    };

    Ok(IngestedFile { name, payload })
}

/// Read every file into a new collection.
pub fn load_collection(paths: &[impl AsRef<Path>], detector: &DetectorConfig) -> Result<MeasurementCollection, AppError> {
    let mut collection = MeasurementCollection::new();
    for path in paths {
        let path = path.as_ref();
        let file = read_input(path)?;
        collection.ingest(&file.name, file.payload, detector)?;
    }
    info!(
        "Loaded {} entries ({} spectra) from {} file(s)",
        collection.len(),
        collection.flatten().len(),
        paths.len()
    );
    Ok(collection)
}

/// Parse two-column ASCII text. Errors carry the 1-based line number.
///
/// Comma- or semicolon-separated files are read as they are; otherwise runs
/// of whitespace (spaces and/or tabs) separate the columns.
pub fn parse_ascii(text: &str) -> Result<RawSpectrum, String> {
    let delimiter = sniff_delimiter(text);
    let normalized;
    let body = match delimiter {
        b',' | b';' => text,
        _ => {
            normalized = collapse_whitespace(text);
            normalized.as_str()
        }
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut wavelengths = Vec::new();
    let mut intensities = Vec::new();
    let mut header_allowed = true;

    for result in reader.records() {
        let record = result.map_err(|e| format!("parse error: {e}"))?;
        let line_no = record.position().map_or(0, |p| p.line());

        let parsed = match (record.get(0), record.get(1)) {
            (Some(w), Some(i)) => w.parse::<f64>().ok().zip(i.parse::<f64>().ok()),
            _ => None,
        };

        match parsed {
            Some((w, i)) => {
                wavelengths.push(w);
                intensities.push(i);
                header_allowed = false;
            }
            None if header_allowed => header_allowed = false,
            None => {
                let row: Vec<&str> = record.iter().collect();
                return Err(format!(
                    "line {line_no}: expected two numeric columns, got '{}'",
                    row.join(" ")
                ));
            }
        }
    }

    if wavelengths.is_empty() {
        return Err("no data rows".to_string());
    }

    Ok(RawSpectrum {
        wavelengths,
        intensities,
        saturation_readings: None,
        acquisition_time: None,
    })
}

/// Separator of the first data line: `,` or `;` if present, tab otherwise.
fn sniff_delimiter(text: &str) -> u8 {
    let first = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .unwrap_or_default();
    if first.contains(';') {
        b';'
    } else if first.contains(',') {
        b','
    } else {
        b'\t'
    }
}

/// Replace each run of whitespace inside a line with one tab. Line breaks stay,
/// so record positions still match the input lines.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        out.push_str(&line.split_whitespace().collect::<Vec<_>>().join("\t"));
        out.push('\n');
    }
    out
}

/// Write a spectrum as tab-separated ASCII that `parse_ascii` reads back.
pub fn write_ascii(path: &Path, spectrum: &RawSpectrum) -> Result<(), AppError> {
    let mut out = String::from("wavelength\tintensity\n");
    for (w, i) in spectrum.wavelengths.iter().zip(&spectrum.intensities) {
        out.push_str(&format!("{w}\t{i}\n"));
    }
    fs::write(path, out)
        .map_err(|e| AppError::new(EXIT_IO, format!("Failed to write '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comments_header_and_whitespace_runs() {
        let text = "# instrument: test\nlambda intensity\n500.0\t1.5\n510.0    2.5\n  520 \t 3.5\n\n";
        let raw = parse_ascii(text).unwrap();
        assert_eq!(raw.wavelengths, vec![500.0, 510.0, 520.0]);
        assert_eq!(raw.intensities, vec![1.5, 2.5, 3.5]);
    }

    #[test]
    fn parses_comma_and_semicolon_files() {
        let raw = parse_ascii("wavelength,intensity\n500, 1.5\n510,2.5\n").unwrap();
        assert_eq!(raw.intensities, vec![1.5, 2.5]);

        let raw = parse_ascii("# exported\n500;1.5;65535\n510;2.5;100\n").unwrap();
        assert_eq!(raw.wavelengths, vec![500.0, 510.0]);
    }

    #[test]
    fn reports_bad_rows_with_line_numbers() {
        let err = parse_ascii("500 1\n510 oops\n").unwrap_err();
        assert!(err.starts_with("line 2"), "{err}");
        assert!(parse_ascii("# only a comment\n").is_err());
    }

    #[test]
    fn file_stem_names_the_measurement() {
        assert_eq!(measurement_name(Path::new("/data/run_07.txt")).unwrap(), "run_07");
        assert!(measurement_name(Path::new("/")).is_err());
    }

    #[test]
    fn ascii_round_trips_through_files() {
        let dir = std::env::temp_dir().join(format!("spectemp-ingest-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("hot.txt");
        let raw = RawSpectrum {
            wavelengths: vec![500.0, 501.0],
            intensities: vec![10.25, 11.5],
            saturation_readings: None,
            acquisition_time: None,
        };
        write_ascii(&path, &raw).unwrap();

        let file = read_input(&path).unwrap();
        assert_eq!(file.name, "hot");
        assert_eq!(file.payload, RawPayload::Single(raw));

        let json = dir.join("mesh.json");
        fs::write(
            &json,
            r#"[{"wavelengths":[500,600],"intensities":[1,2]},{"wavelengths":[500,600],"intensities":[3,4]}]"#,
        )
        .unwrap();
        let collection = load_collection(&[&path, &json], &DetectorConfig::default()).unwrap();
        let names: Vec<&str> = collection.flatten().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["hot", "mesh_0", "mesh_1"]);

        fs::remove_dir_all(&dir).ok();
    }
}
