//! CSV export functionality

use csv::Writer;
use serde::Serialize;

use crate::AppError;

/// Serialize records to CSV, header row first
pub fn write_csv<T: Serialize>(records: &[T]) -> Result<Vec<u8>, AppError> {
    let mut writer = Writer::from_writer(Vec::new());

    for record in records {
        writer
            .serialize(record)
            .map_err(|e| AppError::Internal(format!("Failed to write CSV record: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Failed to flush CSV: {}", e)))
}
