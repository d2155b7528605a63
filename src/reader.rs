use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::domain::{CvParam, MassSpecFormat, Param, UserParam};
use crate::error::LoaderError;
use crate::model::Contact;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub short_label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDecl {
    #[serde(default)]
    pub cv_params: Vec<CvParam>,
    #[serde(default)]
    pub user_params: Vec<UserParam>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentConfiguration {
    pub id: String,
    #[serde(default)]
    pub sources: Vec<ComponentDecl>,
    #[serde(default)]
    pub analyzers: Vec<ComponentDecl>,
    #[serde(default)]
    pub detectors: Vec<ComponentDecl>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedSoftware {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub customization: Option<String>,
    #[serde(default)]
    pub cv_params: Vec<CvParam>,
    #[serde(default)]
    pub user_params: Vec<UserParam>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    #[serde(default)]
    pub cv_params: Vec<CvParam>,
    #[serde(default)]
    pub mass_delta: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectrumRef {
    pub id: String,
    #[serde(default)]
    pub precursor_charge: Option<i32>,
    #[serde(default)]
    pub precursor_mz: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Peptide {
    pub id: String,
    pub sequence: String,
    #[serde(default)]
    pub modifications: Vec<Modification>,
    #[serde(default)]
    pub precursor_charge: Option<i32>,
    #[serde(default)]
    pub precursor_mz: Option<f64>,
    #[serde(default)]
    pub spectrum: Option<SpectrumRef>,
    #[serde(default)]
    pub fragment_ion_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpectraSource {
    pub location: String,
    #[serde(default)]
    pub spectrum_count: Option<u64>,
}

impl SpectraSource {
    pub fn file_name(&self) -> &str {
        self.location
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.location.as_str())
    }
}

pub trait ResultReader {
    fn experiment_metadata(&self) -> Result<ExperimentMetadata, LoaderError>;
    fn protein_ids(&self) -> Result<Vec<String>, LoaderError>;
    fn peptide_ids(&self, protein_id: &str) -> Result<Vec<String>, LoaderError>;
    fn peptide_at(&self, protein_id: &str, peptide_id: &str) -> Result<Peptide, LoaderError>;
    fn instrument_configurations(&self) -> Result<Vec<InstrumentConfiguration>, LoaderError>;
    fn software_list(&self) -> Result<Vec<DecodedSoftware>, LoaderError>;
    fn person_contacts(&self) -> Result<Vec<Contact>, LoaderError>;
    fn additional_terms(&self) -> Result<Vec<Param>, LoaderError>;
    fn number_of_proteins(&self) -> Result<u64, LoaderError>;
    fn number_of_peptides(&self) -> Result<u64, LoaderError>;
    fn number_of_spectra(&self) -> Result<u64, LoaderError>;

    fn has_protein_groups(&self) -> Result<bool, LoaderError> {
        Ok(false)
    }

    fn protein_accession(&self, _protein_id: &str) -> Result<Option<String>, LoaderError> {
        Ok(None)
    }

    fn search_database(&self, _protein_id: &str) -> Result<Option<String>, LoaderError> {
        Ok(None)
    }

    fn spectra_sources(&self) -> Result<Vec<SpectraSource>, LoaderError> {
        Ok(Vec::new())
    }

    fn close(&mut self) -> Result<(), LoaderError> {
        Ok(())
    }
}

pub trait ReaderFactory: Send + Sync {
    fn open(
        &self,
        path: &Utf8Path,
        format: MassSpecFormat,
    ) -> Result<Box<dyn ResultReader>, LoaderError>;

    fn chromatogram_count(
        &self,
        path: &Utf8Path,
        format: MassSpecFormat,
    ) -> Result<u64, LoaderError>;
}
