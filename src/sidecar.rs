use std::collections::HashSet;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{MassSpecFormat, Param};
use crate::error::LoaderError;
use crate::model::Contact;
use crate::reader::{
    DecodedSoftware, ExperimentMetadata, InstrumentConfiguration, Peptide, ReaderFactory,
    ResultReader, SpectraSource,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodedProtein {
    pub id: String,
    #[serde(default)]
    pub accession: Option<String>,
    #[serde(default)]
    pub search_database: Option<String>,
    #[serde(default)]
    pub peptides: Vec<Peptide>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodedResultSet {
    #[serde(default)]
    pub metadata: ExperimentMetadata,
    #[serde(default)]
    pub proteins: Vec<DecodedProtein>,
    #[serde(default)]
    pub protein_groups: bool,
    #[serde(default)]
    pub instrument_configurations: Vec<InstrumentConfiguration>,
    #[serde(default)]
    pub software: Vec<DecodedSoftware>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub additional: Vec<Param>,
    #[serde(default)]
    pub spectra_sources: Vec<SpectraSource>,
    #[serde(default)]
    pub number_of_proteins: Option<u64>,
    #[serde(default)]
    pub number_of_peptides: Option<u64>,
    #[serde(default)]
    pub number_of_spectra: Option<u64>,
    #[serde(default)]
    pub chromatogram_count: u64,
}

#[derive(Debug, Clone)]
pub struct DocumentReader {
    document: DecodedResultSet,
}

impl DocumentReader {
    pub fn new(document: DecodedResultSet) -> Self {
        Self { document }
    }

    fn protein(&self, protein_id: &str) -> Result<&DecodedProtein, LoaderError> {
        self.document
            .proteins
            .iter()
            .find(|protein| protein.id == protein_id)
            .ok_or_else(|| LoaderError::Reader(format!("unknown protein id {protein_id}")))
    }
}

impl ResultReader for DocumentReader {
    fn experiment_metadata(&self) -> Result<ExperimentMetadata, LoaderError> {
        Ok(self.document.metadata.clone())
    }

    fn protein_ids(&self) -> Result<Vec<String>, LoaderError> {
        Ok(self
            .document
            .proteins
            .iter()
            .map(|protein| protein.id.clone())
            .collect())
    }

    fn peptide_ids(&self, protein_id: &str) -> Result<Vec<String>, LoaderError> {
        Ok(self
            .protein(protein_id)?
            .peptides
            .iter()
            .map(|peptide| peptide.id.clone())
            .collect())
    }

    fn peptide_at(&self, protein_id: &str, peptide_id: &str) -> Result<Peptide, LoaderError> {
        self.protein(protein_id)?
            .peptides
            .iter()
            .find(|peptide| peptide.id == peptide_id)
            .cloned()
            .ok_or_else(|| {
                LoaderError::Reader(format!(
                    "unknown peptide id {peptide_id} for protein {protein_id}"
                ))
            })
    }

    fn instrument_configurations(&self) -> Result<Vec<InstrumentConfiguration>, LoaderError> {
        Ok(self.document.instrument_configurations.clone())
    }

    fn software_list(&self) -> Result<Vec<DecodedSoftware>, LoaderError> {
        Ok(self.document.software.clone())
    }

    fn person_contacts(&self) -> Result<Vec<Contact>, LoaderError> {
        Ok(self.document.contacts.clone())
    }

    fn additional_terms(&self) -> Result<Vec<Param>, LoaderError> {
        Ok(self.document.additional.clone())
    }

    fn number_of_proteins(&self) -> Result<u64, LoaderError> {
        Ok(self
            .document
            .number_of_proteins
            .unwrap_or(self.document.proteins.len() as u64))
    }

    fn number_of_peptides(&self) -> Result<u64, LoaderError> {
        Ok(self.document.number_of_peptides.unwrap_or_else(|| {
            self.document
                .proteins
                .iter()
                .map(|protein| protein.peptides.len() as u64)
                .sum()
        }))
    }

    fn number_of_spectra(&self) -> Result<u64, LoaderError> {
        Ok(self.document.number_of_spectra.unwrap_or_else(|| {
            self.document
                .proteins
                .iter()
                .flat_map(|protein| &protein.peptides)
                .filter_map(|peptide| peptide.spectrum.as_ref())
                .map(|spectrum| spectrum.id.as_str())
                .collect::<HashSet<_>>()
                .len() as u64
        }))
    }

    fn has_protein_groups(&self) -> Result<bool, LoaderError> {
        Ok(self.document.protein_groups)
    }

    fn protein_accession(&self, protein_id: &str) -> Result<Option<String>, LoaderError> {
        Ok(self.protein(protein_id)?.accession.clone())
    }

    fn search_database(&self, protein_id: &str) -> Result<Option<String>, LoaderError> {
        Ok(self.protein(protein_id)?.search_database.clone())
    }

    fn spectra_sources(&self) -> Result<Vec<SpectraSource>, LoaderError> {
        Ok(self.document.spectra_sources.clone())
    }
}

#[derive(Debug, Clone)]
pub struct SidecarReaderFactory {
    decoded_root: Utf8PathBuf,
}

impl SidecarReaderFactory {
    pub fn new(decoded_root: Utf8PathBuf) -> Self {
        Self { decoded_root }
    }

    pub fn sidecar_path(&self, path: &Utf8Path) -> Utf8PathBuf {
        let name = path.file_name().unwrap_or(path.as_str());
        self.decoded_root.join(format!("{name}.json"))
    }

    fn load(&self, path: &Utf8Path) -> Result<DecodedResultSet, LoaderError> {
        let sidecar = self.sidecar_path(path);
        let content = fs::read_to_string(sidecar.as_std_path()).map_err(|err| {
            LoaderError::Reader(format!("cannot read decoded result {sidecar}: {err}"))
        })?;
        serde_json::from_str(&content).map_err(|err| {
            LoaderError::Reader(format!("cannot parse decoded result {sidecar}: {err}"))
        })
    }
}

impl ReaderFactory for SidecarReaderFactory {
    fn open(
        &self,
        path: &Utf8Path,
        format: MassSpecFormat,
    ) -> Result<Box<dyn ResultReader>, LoaderError> {
        if !format.is_result_format() {
            return Err(LoaderError::Reader(format!(
                "unsupported result format {format} for {path}"
            )));
        }
        debug!(path = %path, %format, "opening decoded result");
        Ok(Box::new(DocumentReader::new(self.load(path)?)))
    }

    fn chromatogram_count(
        &self,
        path: &Utf8Path,
        format: MassSpecFormat,
    ) -> Result<u64, LoaderError> {
        if !format.carries_chromatograms() {
            return Ok(0);
        }
        if !self.sidecar_path(path).as_std_path().exists() {
            return Ok(0);
        }
        Ok(self.load(path)?.chromatogram_count)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn counts_fall_back_to_document_content() {
        let document: DecodedResultSet = serde_json::from_str(
            r#"{
                "proteins": [
                    { "id": "P1", "accession": "Q9Y6K9", "peptides": [
                        { "id": "a", "sequence": "PEPTIDE", "spectrum": { "id": "s1" } },
                        { "id": "b", "sequence": "PEPTIDE", "spectrum": { "id": "s1" } }
                    ] }
                ]
            }"#,
        )
        .unwrap();
        let reader = DocumentReader::new(document);
        assert_eq!(reader.number_of_proteins().unwrap(), 1);
        assert_eq!(reader.number_of_peptides().unwrap(), 2);
        assert_eq!(reader.number_of_spectra().unwrap(), 1);
        assert_eq!(reader.protein_accession("P1").unwrap().as_deref(), Some("Q9Y6K9"));
        assert_matches!(reader.peptide_at("P1", "zz"), Err(LoaderError::Reader(_)));
    }

    #[test]
    fn missing_sidecar_is_a_reader_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let factory = SidecarReaderFactory::new(root.clone());
        let result = factory.open(&root.join("F1.mzid"), MassSpecFormat::MzIdentMl);
        assert_matches!(result.err(), Some(LoaderError::Reader(_)));
        assert_eq!(
            factory
                .chromatogram_count(&root.join("run.mzML"), MassSpecFormat::MzMl)
                .unwrap(),
            0
        );
    }
}
