use std::collections::HashSet;
use std::fs;
use std::path::Path;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{CvParam, FileRole, Param, SubmissionType};
use crate::error::LoaderError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub project: ProjectMetadata,
    #[serde(default)]
    pub files: Vec<DeclaredFile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub affiliation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sample_processing_protocol: String,
    #[serde(default)]
    pub data_processing_protocol: String,
    #[serde(default)]
    pub keywords: String,
    pub submission_type: SubmissionType,
    pub contact: ContactDetails,
    #[serde(default)]
    pub lab_head: Option<ContactDetails>,
    #[serde(default)]
    pub other_omics_link: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub species: Vec<CvParam>,
    #[serde(default)]
    pub tissues: Vec<CvParam>,
    #[serde(default)]
    pub cell_types: Vec<CvParam>,
    #[serde(default)]
    pub diseases: Vec<CvParam>,
    #[serde(default)]
    pub instruments: Vec<CvParam>,
    #[serde(default)]
    pub modifications: Vec<CvParam>,
    #[serde(default)]
    pub quantifications: Vec<CvParam>,
    #[serde(default)]
    pub experiment_methods: Vec<CvParam>,
    #[serde(default)]
    pub additional: Vec<Param>,
    #[serde(default)]
    pub pubmed_ids: Vec<String>,
    #[serde(default)]
    pub reanalysis_accessions: Vec<String>,
}

impl ProjectMetadata {
    pub fn contact_email(&self) -> Option<&str> {
        self.contact
            .email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    pub fn sample_params(&self) -> impl Iterator<Item = &CvParam> {
        self.species
            .iter()
            .chain(&self.tissues)
            .chain(&self.cell_types)
            .chain(&self.diseases)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleMetadata {
    #[serde(default)]
    pub species: Vec<CvParam>,
    #[serde(default)]
    pub tissues: Vec<CvParam>,
    #[serde(default)]
    pub cell_types: Vec<CvParam>,
    #[serde(default)]
    pub diseases: Vec<CvParam>,
    #[serde(default)]
    pub quantifications: Vec<CvParam>,
    #[serde(default)]
    pub instruments: Vec<CvParam>,
    #[serde(default)]
    pub experimental_factors: Vec<CvParam>,
}

impl SampleMetadata {
    pub fn sample_params(&self) -> impl Iterator<Item = &CvParam> {
        self.species
            .iter()
            .chain(&self.tissues)
            .chain(&self.cell_types)
            .chain(&self.diseases)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredFile {
    pub id: u32,
    pub role: FileRole,
    pub path: Utf8PathBuf,
    #[serde(default)]
    pub assay_accession: Option<String>,
    #[serde(default)]
    pub mappings: Vec<u32>,
    #[serde(default)]
    pub sample: Option<SampleMetadata>,
}

impl DeclaredFile {
    pub fn file_name(&self) -> &str {
        self.path.file_name().unwrap_or(self.path.as_str())
    }

    pub fn assay_accession(&self) -> Option<&str> {
        self.assay_accession
            .as_deref()
            .map(str::trim)
            .filter(|accession| !accession.is_empty())
    }
}

impl Submission {
    pub fn submission_type(&self) -> SubmissionType {
        self.project.submission_type
    }

    pub fn file(&self, id: u32) -> Option<&DeclaredFile> {
        self.files.iter().find(|file| file.id == id)
    }

    pub fn result_files(&self) -> impl Iterator<Item = &DeclaredFile> {
        self.files.iter().filter(|file| file.role == FileRole::Result)
    }

    pub fn mapped_files<'a>(
        &'a self,
        file: &'a DeclaredFile,
    ) -> impl Iterator<Item = &'a DeclaredFile> + 'a {
        file.mappings.iter().filter_map(move |id| self.file(*id))
    }

    pub fn sample_hints(&self, file: &DeclaredFile) -> SampleMetadata {
        match &file.sample {
            Some(sample) => sample.clone(),
            None => SampleMetadata {
                species: self.project.species.clone(),
                tissues: self.project.tissues.clone(),
                cell_types: self.project.cell_types.clone(),
                diseases: self.project.diseases.clone(),
                quantifications: self.project.quantifications.clone(),
                instruments: self.project.instruments.clone(),
                experimental_factors: Vec::new(),
            },
        }
    }

    pub fn owning_result_file(&self, file: &DeclaredFile) -> Option<&DeclaredFile> {
        self.result_files()
            .find(|result| result.mappings.contains(&file.id))
    }

    pub fn validate(&self) -> Result<(), LoaderError> {
        if self.project.title.trim().is_empty() {
            return Err(LoaderError::Validation("project title cannot be blank".to_string()));
        }
        let mut ids = HashSet::new();
        for file in &self.files {
            if !ids.insert(file.id) {
                return Err(LoaderError::Validation(format!(
                    "duplicate file id {} in submission",
                    file.id
                )));
            }
        }
        for file in &self.files {
            if let Some(missing) = file.mappings.iter().find(|id| !ids.contains(id)) {
                return Err(LoaderError::Validation(format!(
                    "file {} maps to undeclared file id {missing}",
                    file.id
                )));
            }
        }
        Ok(())
    }
}

pub struct SubmissionParser;

impl SubmissionParser {
    pub fn parse(path: &Path) -> Result<Submission, LoaderError> {
        let content = fs::read_to_string(path)
            .map_err(|_| LoaderError::SubmissionRead(path.to_path_buf()))?;
        Self::parse_str(&content)
    }

    pub fn parse_str(content: &str) -> Result<Submission, LoaderError> {
        let submission: Submission = serde_json::from_str(content)
            .map_err(|err| LoaderError::SubmissionParse(err.to_string()))?;
        submission.validate()?;
        Ok(submission)
    }
}
