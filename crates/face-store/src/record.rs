//! Face records and the gallery they live in

use crate::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed-length face descriptor produced by the embedding model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Dimensionality
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// An enrolled face. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRecord {
    name: String,
    #[serde(rename = "descriptor")]
    embedding: Embedding,
    #[serde(rename = "timestamp")]
    enrolled_at: DateTime<Utc>,
}

impl FaceRecord {
    /// Create a record. The name must not be blank and the embedding must be
    /// non-empty with every component finite, since JSON has no NaN.
    pub fn new(
        name: impl Into<String>,
        embedding: Embedding,
        enrolled_at: DateTime<Utc>,
    ) -> Result<Self, StorageError> {
        let record = Self {
            name: name.into(),
            embedding,
            enrolled_at,
        };
        record.validate()?;
        Ok(record)
    }

    /// Create a record stamped with the current time
    pub fn enroll_now(name: impl Into<String>, embedding: Embedding) -> Result<Self, StorageError> {
        Self::new(name, embedding, Utc::now())
    }

    fn validate(&self) -> Result<(), StorageError> {
        if self.name.trim().is_empty() {
            return Err(StorageError::InvalidRecord("name is blank".to_string()));
        }
        if self.embedding.is_empty() {
            return Err(StorageError::InvalidRecord(format!(
                "'{}' has an empty descriptor",
                self.name
            )));
        }
        if let Some(i) = self.embedding.0.iter().position(|v| !v.is_finite()) {
            return Err(StorageError::InvalidRecord(format!(
                "'{}' has a non-finite descriptor value at {}",
                self.name, i
            )));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn embedding(&self) -> &Embedding {
        &self.embedding
    }

    pub fn enrolled_at(&self) -> DateTime<Utc> {
        self.enrolled_at
    }
}

/// Ordered collection of enrolled faces.
///
/// Insertion order is preserved and names may repeat. Every embedding has
/// the same dimensionality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FaceRecord>", into = "Vec<FaceRecord>")]
pub struct Gallery {
    records: Vec<FaceRecord>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a gallery, checking every record and the shared dimensionality
    pub fn from_records(records: Vec<FaceRecord>) -> Result<Self, StorageError> {
        let mut gallery = Self::new();
        for record in records {
            gallery.push(record)?;
        }
        Ok(gallery)
    }

    /// Embedding dimensionality, `None` while the gallery is empty
    pub fn dimension(&self) -> Option<usize> {
        self.records.first().map(|r| r.embedding.len())
    }

    /// Check a record can join this gallery
    pub fn check(&self, record: &FaceRecord) -> Result<(), StorageError> {
        record.validate()?;
        match self.dimension() {
            Some(expected) if expected != record.embedding.len() => {
                Err(StorageError::DimensionMismatch {
                    expected,
                    actual: record.embedding.len(),
                })
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn push(&mut self, record: FaceRecord) -> Result<(), StorageError> {
        self.check(&record)?;
        self.records.push(record);
        Ok(())
    }

    pub(crate) fn remove(&mut self, index: usize) -> Result<FaceRecord, StorageError> {
        if index >= self.records.len() {
            return Err(StorageError::NotFound(index));
        }
        Ok(self.records.remove(index))
    }

    pub fn records(&self) -> &[FaceRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FaceRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl TryFrom<Vec<FaceRecord>> for Gallery {
    type Error = StorageError;

    fn try_from(records: Vec<FaceRecord>) -> Result<Self, Self::Error> {
        Self::from_records(records)
    }
}

impl From<Gallery> for Vec<FaceRecord> {
    fn from(gallery: Gallery) -> Self {
        gallery.records
    }
}

impl<'a> IntoIterator for &'a Gallery {
    type Item = &'a FaceRecord;
    type IntoIter = std::slice::Iter<'a, FaceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(name: &str, values: Vec<f32>) -> FaceRecord {
        FaceRecord::new(
            name,
            Embedding::new(values),
            Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_blank_name_rejected() {
        let result = FaceRecord::enroll_now("   ", Embedding::new(vec![0.1]));
        assert!(matches!(result, Err(StorageError::InvalidRecord(_))));
    }

    #[test]
    fn test_empty_descriptor_rejected() {
        let result = FaceRecord::enroll_now("Alice", Embedding::new(vec![]));
        assert!(matches!(result, Err(StorageError::InvalidRecord(_))));
    }

    #[test]
    fn test_non_finite_descriptor_rejected() {
        for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let result = FaceRecord::enroll_now("Alice", Embedding::new(vec![0.1, bad]));
            assert!(matches!(result, Err(StorageError::InvalidRecord(_))), "{}", bad);
        }
    }

    #[test]
    fn test_gallery_rejects_non_finite_record() {
        let broken = FaceRecord {
            name: "Bob".to_string(),
            embedding: Embedding::new(vec![f32::INFINITY, 0.2]),
            enrolled_at: Utc::now(),
        };
        let result = Gallery::from_records(vec![record("Alice", vec![0.1, 0.2]), broken]);
        assert!(matches!(result, Err(StorageError::InvalidRecord(_))));
    }

    #[test]
    fn test_gallery_rejects_mixed_dimensions() {
        let result = Gallery::from_records(vec![
            record("Alice", vec![0.0, 1.0]),
            record("Bob", vec![0.0, 1.0, 2.0]),
        ]);
        assert!(matches!(
            result,
            Err(StorageError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_duplicate_names_keep_insertion_order() {
        let gallery = Gallery::from_records(vec![
            record("Alice", vec![0.0]),
            record("Alice", vec![1.0]),
        ])
        .unwrap();
        assert_eq!(gallery.len(), 2);
        assert_eq!(gallery.records()[1].embedding().as_slice(), &[1.0]);
    }

    #[test]
    fn test_persisted_field_names() {
        let json = serde_json::to_value(record("Alice", vec![0.5, -0.25])).unwrap();
        assert_eq!(json["name"], "Alice");
        assert_eq!(json["descriptor"], serde_json::json!([0.5, -0.25]));
        assert_eq!(json["timestamp"], "2025-03-01T08:30:00Z");
    }

    #[test]
    fn test_document_from_browser_client_parses() {
        let doc = r#"[{"name":"Bob","descriptor":[0.1,0.2],"timestamp":"2025-01-05T10:11:12.345Z"}]"#;
        let gallery: Gallery = serde_json::from_str(doc).unwrap();
        assert_eq!(gallery.dimension(), Some(2));
        assert_eq!(gallery.records()[0].name(), "Bob");
    }
}
