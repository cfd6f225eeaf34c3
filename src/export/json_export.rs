//! JSON export functionality

use serde::Serialize;

use crate::AppError;

/// Serialize records as a pretty-printed JSON array
pub fn write_json<T: Serialize>(records: &[T]) -> Result<Vec<u8>, AppError> {
    serde_json::to_vec_pretty(records)
        .map_err(|e| AppError::Internal(format!("Failed to serialize JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_json_is_indented() {
        #[derive(Serialize)]
        struct Row {
            key: &'static str,
        }
        let text = String::from_utf8(write_json(&[Row { key: "site_name" }]).unwrap()).unwrap();
        assert_eq!(text, "[\n  {\n    \"key\": \"site_name\"\n  }\n]");
    }
}
