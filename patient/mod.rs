//! Canonical, typed patient features consumed by the progression core.
//!
//! Everything the simulator reads about a patient goes through [`PatientFeatures`].
//! Raw records arriving from the serving layer (JSON with mixed receptor encodings
//! and tumor sizes in either unit) are converted by [`record::PatientRecord`].

pub mod record;

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_GRADE: u8 = 2;
pub const DEFAULT_NODES_POSITIVE: u32 = 0;
pub const DEFAULT_AGE: u32 = 60;

/// Molecular subtype of the tumor. Labels outside the known set are carried
/// verbatim in `Unknown` and behave like baseline risk everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MolecularSubtype {
    LuminalA,
    LuminalB,
    LuminalBHer2Positive,
    LuminalBHer2Negative,
    Her2Enriched,
    TripleNegative,
    Unknown(String),
}

impl MolecularSubtype {
    pub fn parse(label: &str) -> Self {
        match label.trim() {
            "Luminal A" => MolecularSubtype::LuminalA,
            "Luminal B" => MolecularSubtype::LuminalB,
            "Luminal B HER2+" => MolecularSubtype::LuminalBHer2Positive,
            "Luminal B HER2-" => MolecularSubtype::LuminalBHer2Negative,
            "HER2 Enriched" => MolecularSubtype::Her2Enriched,
            "Triple Negative" => MolecularSubtype::TripleNegative,
            other => MolecularSubtype::Unknown(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            MolecularSubtype::LuminalA => "Luminal A",
            MolecularSubtype::LuminalB => "Luminal B",
            MolecularSubtype::LuminalBHer2Positive => "Luminal B HER2+",
            MolecularSubtype::LuminalBHer2Negative => "Luminal B HER2-",
            MolecularSubtype::Her2Enriched => "HER2 Enriched",
            MolecularSubtype::TripleNegative => "Triple Negative",
            MolecularSubtype::Unknown(label) => label,
        }
    }
}

impl Default for MolecularSubtype {
    fn default() -> Self {
        MolecularSubtype::Unknown("unknown".to_string())
    }
}

impl From<String> for MolecularSubtype {
    fn from(label: String) -> Self {
        MolecularSubtype::parse(&label)
    }
}

impl From<MolecularSubtype> for String {
    fn from(subtype: MolecularSubtype) -> Self {
        subtype.label().to_string()
    }
}

impl fmt::Display for MolecularSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceptorStatus {
    Positive,
    Negative,
}

impl ReceptorStatus {
    #[inline]
    pub fn is_positive(self) -> bool {
        matches!(self, ReceptorStatus::Positive)
    }
}

impl From<bool> for ReceptorStatus {
    fn from(positive: bool) -> Self {
        if positive {
            ReceptorStatus::Positive
        } else {
            ReceptorStatus::Negative
        }
    }
}

/// The single typed feature record the core works with.
///
/// Optional fields are resolved through the accessor methods, which apply the
/// documented defaults; a missing field never causes a failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientFeatures {
    pub age: Option<u32>,
    /// Always millimetres; the boundary adapter converts centimetre inputs.
    pub tumor_size_mm: Option<f64>,
    pub grade: Option<u8>,
    pub nodes_positive: Option<u32>,
    pub er_status: Option<ReceptorStatus>,
    pub pr_status: Option<ReceptorStatus>,
    pub her2_status: Option<ReceptorStatus>,
    #[serde(default)]
    pub molecular_subtype: MolecularSubtype,
}

impl PatientFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_tumor_size_mm(mut self, size: f64) -> Self {
        self.tumor_size_mm = Some(size);
        self
    }

    pub fn with_grade(mut self, grade: u8) -> Self {
        self.grade = Some(grade);
        self
    }

    pub fn with_nodes_positive(mut self, nodes: u32) -> Self {
        self.nodes_positive = Some(nodes);
        self
    }

    pub fn with_subtype(mut self, subtype: MolecularSubtype) -> Self {
        self.molecular_subtype = subtype;
        self
    }

    pub fn with_receptors(
        mut self,
        er: ReceptorStatus,
        pr: ReceptorStatus,
        her2: ReceptorStatus,
    ) -> Self {
        self.er_status = Some(er);
        self.pr_status = Some(pr);
        self.her2_status = Some(her2);
        self
    }

    pub fn grade(&self) -> u8 {
        self.grade.unwrap_or(DEFAULT_GRADE)
    }

    pub fn nodes_positive(&self) -> u32 {
        self.nodes_positive.unwrap_or(DEFAULT_NODES_POSITIVE)
    }

    pub fn age(&self) -> u32 {
        self.age.unwrap_or(DEFAULT_AGE)
    }

    pub fn er_status(&self) -> ReceptorStatus {
        self.er_status.unwrap_or(ReceptorStatus::Positive)
    }

    pub fn pr_status(&self) -> ReceptorStatus {
        self.pr_status.unwrap_or(ReceptorStatus::Positive)
    }

    pub fn her2_status(&self) -> ReceptorStatus {
        self.her2_status.unwrap_or(ReceptorStatus::Negative)
    }

    pub fn subtype(&self) -> &MolecularSubtype {
        &self.molecular_subtype
    }
}
