use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Annotation, EntityId, FileRole, SubmissionType, TermSet, UserParam};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub title: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub affiliation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Software {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub customization: Option<String>,
    pub order: usize,
    #[serde(default)]
    pub terms: Vec<Annotation>,
    #[serde(default)]
    pub user_params: Vec<UserParam>,
}

impl Software {
    pub fn key(&self) -> (&str, Option<&str>) {
        (self.name.as_str(), self.version.as_deref())
    }

    pub fn display_name(&self) -> String {
        match &self.version {
            Some(version) => format!("{} {}", self.name, version).trim().to_string(),
            None => self.name.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Source,
    Analyzer,
    Detector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentComponent {
    pub kind: ComponentKind,
    pub order: u32,
    #[serde(default)]
    pub terms: Vec<Annotation>,
    #[serde(default)]
    pub user_params: Vec<UserParam>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub model: Annotation,
    pub components: Vec<InstrumentComponent>,
}

impl Instrument {
    pub fn components_of(&self, kind: ComponentKind) -> impl Iterator<Item = &InstrumentComponent> {
        self.components.iter().filter(move |component| component.kind == kind)
    }

    pub fn key(&self) -> (&str, Option<&str>) {
        (self.model.accession(), self.model.value.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakFileSummary {
    pub file_name: String,
    pub missing: bool,
    #[serde(default)]
    pub spectrum_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assay {
    #[serde(default)]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub project_id: Option<EntityId>,
    pub accession: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub short_label: Option<String>,
    pub protein_count: u64,
    pub peptide_count: u64,
    pub unique_peptide_count: u64,
    pub identified_spectrum_count: u64,
    pub total_spectrum_count: u64,
    pub ms2_annotation: bool,
    pub chromatogram: bool,
    pub delta_mz_error_rate: f64,
    pub protein_group_present: bool,
    #[serde(default)]
    pub example_protein_accession: Option<String>,
    #[serde(default)]
    pub search_database: Option<String>,
    #[serde(default)]
    pub experimental_factor: Option<String>,
    pub samples: TermSet,
    pub ptms: TermSet,
    pub quantification_methods: TermSet,
    pub instruments: TermSet,
    #[serde(default)]
    pub instrument_configurations: Vec<Instrument>,
    #[serde(default)]
    pub software: Vec<Software>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub additional_terms: Vec<Annotation>,
    #[serde(default)]
    pub additional_user_params: Vec<UserParam>,
    #[serde(default)]
    pub peak_files: Vec<PeakFileSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub pubmed_id: u32,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub citation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabHead {
    pub name: String,
    pub email: String,
    pub affiliation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: Option<EntityId>,
    pub accession: String,
    #[serde(default)]
    pub doi: Option<String>,
    pub submitter_id: EntityId,
    pub title: String,
    pub description: String,
    pub sample_processing_protocol: String,
    pub data_processing_protocol: String,
    #[serde(default)]
    pub other_omics_link: Option<String>,
    pub keywords: String,
    pub submission_type: SubmissionType,
    pub submission_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
    pub public_project: bool,
    pub num_assays: usize,
    #[serde(default)]
    pub reanalysis: Option<String>,
    #[serde(default)]
    pub lab_heads: Vec<LabHead>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub references: Vec<Reference>,
    pub experiment_types: TermSet,
    pub additional_terms: TermSet,
    #[serde(default)]
    pub additional_user_params: Vec<UserParam>,
    pub samples: TermSet,
    pub ptms: TermSet,
    pub quantification_methods: TermSet,
    pub instruments: TermSet,
    #[serde(default)]
    pub instrument_configurations: Vec<Instrument>,
    #[serde(default)]
    pub software: Vec<Software>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileSource {
    Submitted,
    Generated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    #[serde(default)]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub project_id: Option<EntityId>,
    #[serde(default)]
    pub assay_id: Option<EntityId>,
    pub role: FileRole,
    pub file_name: String,
    pub file_path: String,
    pub file_size: u64,
    pub source: FileSource,
}
