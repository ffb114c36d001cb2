//! Column encodings shared by the SQLite tables.

use attend_core::StoreError;
use chrono::NaiveDateTime;

/// ISO-8601 local timestamp, fractional seconds optional.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Pack an embedding as little-endian `f32`s.
pub(crate) fn embedding_to_blob(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub(crate) fn blob_to_embedding(id: i64, blob: &[u8]) -> Result<Vec<f32>, StoreError> {
    if blob.len() % 4 != 0 {
        return Err(StoreError::Corrupt(format!(
            "identity {id}: embedding blob of {} bytes is not a whole number of f32s",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

pub(crate) fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(s: &str) -> Result<NaiveDateTime, StoreError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|e| StoreError::Corrupt(format!("timestamp {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_layout_is_little_endian() {
        let blob = embedding_to_blob(&[1.0, -2.5]);
        assert_eq!(blob.len(), 8);
        assert_eq!(&blob[..4], &1.0f32.to_le_bytes());
        assert_eq!(blob_to_embedding(1, &blob).unwrap(), vec![1.0, -2.5]);
    }

    #[test]
    fn test_truncated_blob_is_corrupt() {
        let err = blob_to_embedding(7, &[0, 0, 128]).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(msg) if msg.contains("identity 7")));
    }

    #[test]
    fn test_timestamp_accepts_fractional_seconds() {
        let plain = parse_timestamp("2024-01-10T08:00:00").unwrap();
        let frac = parse_timestamp("2024-01-10T08:00:00.250").unwrap();
        assert_eq!(format_timestamp(&plain), "2024-01-10T08:00:00");
        assert!(frac > plain);
        assert!(parse_timestamp("10/01/2024 08:00").is_err());
    }
}
