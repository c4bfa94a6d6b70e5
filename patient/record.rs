//! Boundary adapter: raw patient records as the serving layer sends them.
//!
//! Call sites disagree on encodings. Receptor status arrives either as a boolean
//! or as a "positive"/"negative" string, and tumor size arrives in centimetres
//! from some callers and millimetres from others. This module accepts all of
//! them and produces one canonical [`PatientFeatures`].

use super::{MolecularSubtype, PatientFeatures, ReceptorStatus};
use crate::treatment::TreatmentPlan;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_AGE: f64 = 120.0;
const MAX_TUMOR_SIZE_MM: f64 = 1000.0;
const MAX_NODES_POSITIVE: i64 = 100;

const REQUIRED_FIELDS: [&str; 7] = [
    "age",
    "tumor_size",
    "grade",
    "nodes_positive",
    "er_status",
    "pr_status",
    "her2_status",
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatientError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("Age must be between 0 and 120 (got {0})")]
    AgeOutOfRange(f64),
    #[error("Tumor size must be between 0 and 1000 mm (got {0} mm)")]
    TumorSizeOutOfRange(f64),
    #[error("Grade must be 1, 2, or 3 (got {0})")]
    InvalidGrade(i64),
    #[error("Number of positive nodes must be between 0 and 100 (got {0})")]
    NodesOutOfRange(i64),
    #[error("{field} must be 'positive' or 'negative' (got '{value}')")]
    InvalidReceptorStatus { field: &'static str, value: String },
}

/// Receptor status in either of the encodings seen at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawReceptorStatus {
    Flag(bool),
    Label(String),
}

impl RawReceptorStatus {
    /// Strict interpretation: `None` for strings other than positive/negative.
    fn interpret(&self) -> Option<ReceptorStatus> {
        match self {
            RawReceptorStatus::Flag(flag) => Some(ReceptorStatus::from(*flag)),
            RawReceptorStatus::Label(label) => match label.trim().to_ascii_lowercase().as_str() {
                "positive" | "pos" | "+" => Some(ReceptorStatus::Positive),
                "negative" | "neg" | "-" => Some(ReceptorStatus::Negative),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeUnit {
    #[default]
    Mm,
    Cm,
}

/// A patient record exactly as it arrives from the outside.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub age: Option<f64>,
    #[serde(default)]
    pub tumor_size: Option<f64>,
    #[serde(default)]
    pub tumor_size_unit: Option<SizeUnit>,
    #[serde(default)]
    pub tumor_size_cm: Option<f64>,
    #[serde(default)]
    pub grade: Option<i64>,
    #[serde(default, alias = "lymph_nodes_positive")]
    pub nodes_positive: Option<i64>,
    #[serde(default)]
    pub er_status: Option<RawReceptorStatus>,
    #[serde(default)]
    pub pr_status: Option<RawReceptorStatus>,
    #[serde(default)]
    pub her2_status: Option<RawReceptorStatus>,
    #[serde(default)]
    pub molecular_subtype: Option<String>,
    #[serde(default)]
    pub treatment_plan: Option<TreatmentPlan>,
}

impl PatientRecord {
    /// Tumor size in millimetres, whichever field and unit carried it.
    pub fn tumor_size_mm(&self) -> Option<f64> {
        match (self.tumor_size, self.tumor_size_cm) {
            (Some(size), _) => Some(match self.tumor_size_unit.unwrap_or_default() {
                SizeUnit::Mm => size,
                SizeUnit::Cm => size * 10.0,
            }),
            (None, Some(size_cm)) => Some(size_cm * 10.0),
            (None, None) => None,
        }
    }

    /// Names of required fields that are absent from the record.
    pub fn missing_fields(&self) -> Vec<String> {
        let present = [
            self.age.is_some(),
            self.tumor_size_mm().is_some(),
            self.grade.is_some(),
            self.nodes_positive.is_some(),
            self.er_status.is_some(),
            self.pr_status.is_some(),
            self.her2_status.is_some(),
        ];
        REQUIRED_FIELDS
            .iter()
            .zip(present)
            .filter(|(_, is_present)| !is_present)
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Range checks on the fields that are present. With `require_complete`
    /// every required field must also be present.
    pub fn validate(&self, require_complete: bool) -> Result<(), PatientError> {
        if require_complete {
            let missing = self.missing_fields();
            if !missing.is_empty() {
                return Err(PatientError::MissingFields(missing));
            }
        }

        if let Some(age) = self.age {
            if !(0.0..=MAX_AGE).contains(&age) {
                return Err(PatientError::AgeOutOfRange(age));
            }
        }
        if let Some(size) = self.tumor_size_mm() {
            if !(0.0..=MAX_TUMOR_SIZE_MM).contains(&size) {
                return Err(PatientError::TumorSizeOutOfRange(size));
            }
        }
        if let Some(grade) = self.grade {
            if !(1..=3).contains(&grade) {
                return Err(PatientError::InvalidGrade(grade));
            }
        }
        if let Some(nodes) = self.nodes_positive {
            if !(0..=MAX_NODES_POSITIVE).contains(&nodes) {
                return Err(PatientError::NodesOutOfRange(nodes));
            }
        }
        for (field, status) in self.receptor_fields() {
            if let Some(RawReceptorStatus::Label(value)) = status {
                if status.as_ref().and_then(RawReceptorStatus::interpret).is_none() {
                    return Err(PatientError::InvalidReceptorStatus {
                        field,
                        value: value.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Converts to canonical features. Never fails: unusable values fall back to
    /// the per-field defaults.
    pub fn normalize(&self) -> PatientFeatures {
        let age = self
            .age
            .filter(|age| age.is_finite() && *age >= 0.0)
            .map(|age| age.round() as u32);
        let tumor_size_mm = self
            .tumor_size_mm()
            .filter(|size| size.is_finite() && *size >= 0.0);
        let grade = self.grade.and_then(|grade| match grade {
            1..=3 => Some(grade as u8),
            other => {
                log::warn!("Ignoring out-of-range grade {other}; using the default");
                None
            }
        });
        let nodes_positive = self
            .nodes_positive
            .and_then(|nodes| u32::try_from(nodes).ok());

        let [er_status, pr_status, her2_status] = self.receptor_fields().map(|(field, raw)| {
            raw.as_ref().map(|raw| {
                raw.interpret().unwrap_or_else(|| {
                    log::warn!("Unrecognized {field} value {raw:?}; treating as negative");
                    ReceptorStatus::Negative
                })
            })
        });

        let molecular_subtype = self
            .molecular_subtype
            .as_deref()
            .map(MolecularSubtype::parse)
            .unwrap_or_default();

        PatientFeatures {
            age,
            tumor_size_mm,
            grade,
            nodes_positive,
            er_status,
            pr_status,
            her2_status,
            molecular_subtype,
        }
    }

    fn receptor_fields(&self) -> [(&'static str, &Option<RawReceptorStatus>); 3] {
        [
            ("er_status", &self.er_status),
            ("pr_status", &self.pr_status),
            ("her2_status", &self.her2_status),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> PatientRecord {
        serde_json::from_str(json).expect("patient record json")
    }

    #[test]
    fn boolean_and_string_receptors_normalize_identically() {
        let flags = parse(r#"{"er_status": true, "pr_status": false, "her2_status": true}"#);
        let labels = parse(
            r#"{"er_status": "positive", "pr_status": "negative", "her2_status": "Positive"}"#,
        );
        assert_eq!(flags.normalize(), labels.normalize());
        let features = flags.normalize();
        assert_eq!(features.er_status(), ReceptorStatus::Positive);
        assert_eq!(features.pr_status(), ReceptorStatus::Negative);
        assert_eq!(features.her2_status(), ReceptorStatus::Positive);
    }

    #[test]
    fn centimetre_sizes_are_converted() {
        assert_eq!(parse(r#"{"tumor_size_cm": 2.5}"#).normalize().tumor_size_mm, Some(25.0));
        assert_eq!(
            parse(r#"{"tumor_size": 3.0, "tumor_size_unit": "cm"}"#)
                .normalize()
                .tumor_size_mm,
            Some(30.0)
        );
        assert_eq!(parse(r#"{"tumor_size": 18}"#).normalize().tumor_size_mm, Some(18.0));
    }

    #[test]
    fn lymph_node_alias_is_accepted() {
        let record = parse(r#"{"lymph_nodes_positive": 4}"#);
        assert_eq!(record.normalize().nodes_positive(), 4);
    }

    #[test]
    fn empty_record_normalizes_to_defaults() {
        let features = PatientRecord::default().normalize();
        assert_eq!(features, PatientFeatures::default());
    }

    #[test]
    fn unusable_values_fall_back_to_defaults() {
        let record = parse(r#"{"grade": 7, "nodes_positive": -2, "er_status": "unclear"}"#);
        let features = record.normalize();
        assert_eq!(features.grade(), 2);
        assert_eq!(features.nodes_positive(), 0);
        assert_eq!(features.er_status(), ReceptorStatus::Negative);
    }

    #[test]
    fn validation_reports_range_errors() {
        assert_eq!(
            parse(r#"{"age": 130}"#).validate(false),
            Err(PatientError::AgeOutOfRange(130.0))
        );
        assert_eq!(
            parse(r#"{"grade": 4}"#).validate(false),
            Err(PatientError::InvalidGrade(4))
        );
        assert_eq!(
            parse(r#"{"nodes_positive": 101}"#).validate(false),
            Err(PatientError::NodesOutOfRange(101))
        );
        assert_eq!(
            parse(r#"{"tumor_size_cm": 150}"#).validate(false),
            Err(PatientError::TumorSizeOutOfRange(1500.0))
        );
        assert!(matches!(
            parse(r#"{"her2_status": "equivocal"}"#).validate(false),
            Err(PatientError::InvalidReceptorStatus { field: "her2_status", .. })
        ));
    }

    #[test]
    fn strict_validation_requires_every_field() {
        let partial = parse(r#"{"age": 55, "grade": 2}"#);
        assert!(partial.validate(false).is_ok());
        match partial.validate(true) {
            Err(PatientError::MissingFields(missing)) => {
                assert_eq!(
                    missing,
                    vec![
                        "tumor_size",
                        "nodes_positive",
                        "er_status",
                        "pr_status",
                        "her2_status"
                    ]
                );
            }
            other => panic!("expected missing fields, got {other:?}"),
        }

        let complete = parse(
            r#"{"age": 55, "tumor_size": 22, "grade": 2, "nodes_positive": 1,
                "er_status": true, "pr_status": "negative", "her2_status": false}"#,
        );
        assert!(complete.validate(true).is_ok());
    }

    #[test]
    fn embedded_treatment_plan_is_read() {
        let record = parse(r#"{"treatment_plan": {"treatment_type": "surgery"}}"#);
        let plan = record.treatment_plan.expect("plan");
        assert_eq!(plan.treatment_type, "surgery");
        assert_eq!(plan.duration_months, None);
    }
}
