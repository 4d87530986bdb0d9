//! Persisted outputs of an evaluation run.

use std::fs;
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::error::EvalError;
use crate::eval::PredictionRecord;

/// Creates `dir` and any missing parents.
pub fn ensure_output_dir<P: AsRef<Path>>(dir: P) -> Result<(), EvalError> {
    let dir = dir.as_ref();
    if !dir.exists() {
        info!("Creating output directory {:?}", dir);
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<(), EvalError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_output_dir(parent),
        _ => Ok(()),
    }
}

/// Writes `value` as pretty-printed JSON.
pub fn write_json<T: Serialize + ?Sized, P: AsRef<Path>>(path: P, value: &T) -> Result<(), EvalError> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    info!("Wrote {:?}", path);
    Ok(())
}

/// Writes one row per record with the columns `Sentence,Class_id,Prediction_id`.
pub fn write_predictions_csv<P: AsRef<Path>>(path: P, records: &[PredictionRecord]) -> Result<(), EvalError> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    if records.is_empty() {
        // serde only emits the header alongside the first record
        writer.write_record(["Sentence", "Class_id", "Prediction_id"])?;
    }
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    info!("Wrote {} predictions to {:?}", records.len(), path);
    Ok(())
}

/// Writes a confusion matrix with a header of class names and one row per true class.
///
/// # Errors
/// - `InputShape` if the matrix is not square over `classes`
pub fn write_confusion_csv<P: AsRef<Path>, S: AsRef<str>>(
    path: P,
    matrix: &[Vec<f64>],
    classes: &[S],
) -> Result<(), EvalError> {
    let n = classes.len();
    if matrix.len() != n || matrix.iter().any(|row| row.len() != n) {
        return Err(EvalError::InputShape(format!(
            "Confusion matrix must be {}x{} to match the class list",
            n, n
        )));
    }

    let path = path.as_ref();
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec![String::new()];
    header.extend(classes.iter().map(|c| c.as_ref().to_string()));
    writer.write_record(&header)?;
    for (class, row) in classes.iter().zip(matrix) {
        let mut record = vec![class.as_ref().to_string()];
        record.extend(row.iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    info!("Wrote confusion matrix to {:?}", path);
    Ok(())
}
