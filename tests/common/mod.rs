#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Value, json};
use tempfile::TempDir;

use prider_loader::domain::{CvParam, EntityId, MassSpecFormat, NewTerm, Param, Term, decompressed_name};
use prider_loader::error::{LoaderError, SubmissionLoadError};
use prider_loader::loader::SubmissionLoader;
use prider_loader::locator::FileLocator;
use prider_loader::mass::{PROTON, peptide_neutral_mass};
use prider_loader::model::{Assay, Contact, Project, ProjectFile, User};
use prider_loader::reader::{
    ComponentDecl, DecodedSoftware, ExperimentMetadata, InstrumentConfiguration, Peptide, ReaderFactory,
    ResultReader, SpectraSource, SpectrumRef,
};
use prider_loader::repository::{
    Archive, AssayRepository, FileRepository, ProjectRepository, TermRepository, UserRepository,
};
use prider_loader::sidecar::{DecodedProtein, DecodedResultSet, DocumentReader};
use prider_loader::store::ArchiveStore;
use prider_loader::submission::{Submission, SubmissionParser};
use prider_loader::term_cache::TermCache;

pub const SUBMITTER_EMAIL: &str = "john.smith@dummy.ebi.com";

pub fn utf8_tempdir() -> (TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    (dir, path)
}

pub fn cv(cv_label: &str, accession: &str, name: &str) -> CvParam {
    CvParam::new(cv_label, accession, name)
}

/// Peptide whose precursor m/z matches its sequence exactly at charge 2.
pub fn matched_peptide(id: &str, sequence: &str, spectrum_id: &str) -> Peptide {
    let mz = (peptide_neutral_mass(sequence).unwrap() + 2.0 * PROTON) / 2.0;
    Peptide {
        id: id.to_string(),
        sequence: sequence.to_string(),
        precursor_charge: Some(2),
        precursor_mz: Some(mz),
        spectrum: Some(SpectrumRef {
            id: spectrum_id.to_string(),
            precursor_charge: None,
            precursor_mz: None,
        }),
        ..Peptide::default()
    }
}

pub fn protein(id: &str, peptides: Vec<Peptide>) -> DecodedProtein {
    DecodedProtein {
        id: id.to_string(),
        accession: Some(format!("ACC_{id}")),
        search_database: Some("uniprot_sprot".to_string()),
        peptides,
    }
}

pub const SCENARIO_SEQUENCES: [&str; 7] = [
    "PEPTIDEK",
    "LGEYGFQNALIVR",
    "AEFVEVTK",
    "QTALVELLK",
    "YLYEIAR",
    "HPYFYAPELLYYANK",
    "VPQVSTPTLVEVSR",
];

/// 7 proteins, 11 peptides over 7 sequences and 11 spectra; 39 spectra
/// declared by the file.
pub fn scenario_document() -> DecodedResultSet {
    let mut spectrum = 0;
    let mut next_spectrum = || {
        spectrum += 1;
        format!("index={spectrum}")
    };
    let proteins = SCENARIO_SEQUENCES
        .iter()
        .enumerate()
        .map(|(index, sequence)| {
            let mut peptides = vec![matched_peptide("1", sequence, &next_spectrum())];
            if index < 4 {
                let repeat = SCENARIO_SEQUENCES[(index + 1) % 4];
                peptides.push(matched_peptide("2", repeat, &next_spectrum()));
            }
            protein(&format!("DBSeq_{index}"), peptides)
        })
        .collect();

    DecodedResultSet {
        metadata: ExperimentMetadata {
            title: Some("mzidentml test".to_string()),
            short_label: Some("mzid".to_string()),
        },
        proteins,
        instrument_configurations: vec![InstrumentConfiguration {
            id: "LCQ Deca".to_string(),
            sources: vec![ComponentDecl {
                cv_params: vec![cv("MS", "MS:1000073", "electrospray ionization")],
                ..ComponentDecl::default()
            }],
            analyzers: vec![ComponentDecl {
                cv_params: vec![cv("MS", "MS:1000264", "ion trap")],
                ..ComponentDecl::default()
            }],
            detectors: vec![ComponentDecl {
                cv_params: vec![cv("MS", "MS:1000253", "electron multiplier")],
                ..ComponentDecl::default()
            }],
        }],
        software: vec![
            DecodedSoftware {
                name: "Mascot".to_string(),
                version: Some("2.2.0".to_string()),
                cv_params: vec![cv("MS", "MS:1001207", "Mascot")],
                ..DecodedSoftware::default()
            },
            DecodedSoftware {
                name: "ProteoWizard".to_string(),
                version: Some("3.0".to_string()),
                ..DecodedSoftware::default()
            },
        ],
        contacts: vec![Contact {
            title: None,
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: Some("jane@example.org".to_string()),
            affiliation: None,
        }],
        additional: vec![Param::Cv(cv("MS", "MS:1001460", "unknown modification"))],
        number_of_spectra: Some(39),
        ..DecodedResultSet::default()
    }
}

/// 2 proteins, 5 peptides over 3 sequences, 4 distinct spectra.
pub fn two_protein_document() -> DecodedResultSet {
    DecodedResultSet {
        proteins: vec![
            protein(
                "PROT_1",
                vec![
                    matched_peptide("1", "PEPTIDEK", "s1"),
                    matched_peptide("2", "AEFVEVTK", "s2"),
                    matched_peptide("3", "PEPTIDEK", "s3"),
                ],
            ),
            protein(
                "PROT_2",
                vec![
                    matched_peptide("1", "YLYEIAR", "s4"),
                    matched_peptide("2", "AEFVEVTK", "s2"),
                ],
            ),
        ],
        ..DecodedResultSet::default()
    }
}

pub fn project_json(submission_type: &str) -> Value {
    json!({
        "title": "mzidentml test",
        "description": "Test submission",
        "sample_processing_protocol": "none",
        "data_processing_protocol": "none",
        "keywords": "mzidentml test",
        "submission_type": submission_type,
        "contact": {
            "name": "John Smith",
            "email": SUBMITTER_EMAIL,
            "affiliation": "EBI"
        },
        "species": [{ "cv_label": "NEWT", "accession": "9606", "name": "Homo sapiens (Human)" }],
        "instruments": [{ "cv_label": "MS", "accession": "MS:1000447", "name": "LTQ" }],
        "modifications": [{ "cv_label": "MOD", "accession": "MOD:00719", "name": "L-methionine sulfoxide" }],
        "quantifications": [{ "cv_label": "PRIDE", "accession": "PRIDE:0000436", "name": "Spectral counting" }],
        "experiment_methods": [{ "cv_label": "PRIDE", "accession": "PRIDE:0000429", "name": "Shotgun proteomics" }],
        "pubmed_ids": ["23203882"]
    })
}

pub fn submission(project: Value, files: Value) -> Submission {
    let descriptor = json!({ "project": project, "files": files });
    SubmissionParser::parse_str(&descriptor.to_string()).unwrap()
}

/// One RESULT file (`F001261.mzid`, assay `1234`) mapped to one peak list.
pub fn complete_submission() -> Submission {
    submission(
        project_json("COMPLETE"),
        json!([
            { "id": 1, "role": "RESULT", "path": "F001261.mzid", "assay_accession": "1234", "mappings": [2] },
            { "id": 2, "role": "PEAK", "path": "F001261.mgf" },
            { "id": 3, "role": "RAW", "path": "F001261.raw" }
        ]),
    )
}

pub struct TrackingReader {
    inner: DocumentReader,
    closed: Arc<AtomicUsize>,
    fail_entries: bool,
}

impl ResultReader for TrackingReader {
    fn experiment_metadata(&self) -> Result<ExperimentMetadata, LoaderError> {
        self.inner.experiment_metadata()
    }

    fn protein_ids(&self) -> Result<Vec<String>, LoaderError> {
        self.inner.protein_ids()
    }

    fn peptide_ids(&self, protein_id: &str) -> Result<Vec<String>, LoaderError> {
        self.inner.peptide_ids(protein_id)
    }

    fn peptide_at(&self, protein_id: &str, peptide_id: &str) -> Result<Peptide, LoaderError> {
        if self.fail_entries {
            return Err(LoaderError::Reader("truncated file".to_string()));
        }
        self.inner.peptide_at(protein_id, peptide_id)
    }

    fn instrument_configurations(&self) -> Result<Vec<InstrumentConfiguration>, LoaderError> {
        self.inner.instrument_configurations()
    }

    fn software_list(&self) -> Result<Vec<DecodedSoftware>, LoaderError> {
        self.inner.software_list()
    }

    fn person_contacts(&self) -> Result<Vec<Contact>, LoaderError> {
        self.inner.person_contacts()
    }

    fn additional_terms(&self) -> Result<Vec<Param>, LoaderError> {
        self.inner.additional_terms()
    }

    fn number_of_proteins(&self) -> Result<u64, LoaderError> {
        self.inner.number_of_proteins()
    }

    fn number_of_peptides(&self) -> Result<u64, LoaderError> {
        self.inner.number_of_peptides()
    }

    fn number_of_spectra(&self) -> Result<u64, LoaderError> {
        self.inner.number_of_spectra()
    }

    fn has_protein_groups(&self) -> Result<bool, LoaderError> {
        self.inner.has_protein_groups()
    }

    fn protein_accession(&self, protein_id: &str) -> Result<Option<String>, LoaderError> {
        self.inner.protein_accession(protein_id)
    }

    fn search_database(&self, protein_id: &str) -> Result<Option<String>, LoaderError> {
        self.inner.search_database(protein_id)
    }

    fn spectra_sources(&self) -> Result<Vec<SpectraSource>, LoaderError> {
        self.inner.spectra_sources()
    }

    fn close(&mut self) -> Result<(), LoaderError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Serves decoded documents by file name and counts opens and closes.
#[derive(Default)]
pub struct MapReaderFactory {
    documents: HashMap<String, DecodedResultSet>,
    chromatograms: HashMap<String, u64>,
    failing: HashSet<String>,
    pub opened: AtomicUsize,
    pub closed: Arc<AtomicUsize>,
    pub chromatogram_queries: Mutex<Vec<String>>,
}

impl MapReaderFactory {
    pub fn with_result(mut self, name: &str, document: DecodedResultSet) -> Self {
        self.documents.insert(name.to_string(), document);
        self
    }

    pub fn with_chromatograms(mut self, name: &str, count: u64) -> Self {
        self.chromatograms.insert(name.to_string(), count);
        self
    }

    pub fn failing_entries(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ReaderFactory for MapReaderFactory {
    fn open(
        &self,
        path: &Utf8Path,
        _format: MassSpecFormat,
    ) -> Result<Box<dyn ResultReader>, LoaderError> {
        let name = path.file_name().unwrap_or(path.as_str());
        let document = self
            .documents
            .get(name)
            .cloned()
            .ok_or_else(|| LoaderError::Reader(format!("cannot decode {name}")))?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TrackingReader {
            inner: DocumentReader::new(document),
            closed: self.closed.clone(),
            fail_entries: self.failing.contains(name),
        }))
    }

    fn chromatogram_count(
        &self,
        path: &Utf8Path,
        _format: MassSpecFormat,
    ) -> Result<u64, LoaderError> {
        let name = path.file_name().unwrap_or(path.as_str()).to_string();
        let count = self.chromatograms.get(&name).copied().unwrap_or(0);
        self.chromatogram_queries.lock().unwrap().push(name);
        Ok(count)
    }
}

/// Resolves every reference under `/submission` without touching disk.
#[derive(Default)]
pub struct FixedLocator {
    missing: HashSet<String>,
}

impl FixedLocator {
    pub fn missing(name: &str) -> Self {
        Self {
            missing: HashSet::from([name.to_string()]),
        }
    }
}

impl FileLocator for FixedLocator {
    fn resolve(&self, reference: &Utf8Path) -> Result<Utf8PathBuf, LoaderError> {
        let name = reference.file_name().unwrap_or(reference.as_str());
        if self.missing.contains(name) {
            return Err(LoaderError::FileNotFound(reference.to_string()));
        }
        Ok(Utf8PathBuf::from("/submission").join(decompressed_name(name)))
    }

    fn file_size(&self, _path: &Utf8Path) -> Result<u64, LoaderError> {
        Ok(1024)
    }
}

/// Archive wrapper whose `save_file` fails on the given call (1-based).
pub struct FailingArchive {
    pub inner: Arc<ArchiveStore>,
    fail_file_at: usize,
    file_saves: Mutex<usize>,
}

impl FailingArchive {
    pub fn new(inner: Arc<ArchiveStore>, fail_file_at: usize) -> Self {
        Self {
            inner,
            fail_file_at,
            file_saves: Mutex::new(0),
        }
    }
}

impl ProjectRepository for FailingArchive {
    fn save_project(&self, project: &Project) -> Result<EntityId, LoaderError> {
        self.inner.save_project(project)
    }

    fn find_project_by_accession(&self, accession: &str) -> Result<Option<Project>, LoaderError> {
        self.inner.find_project_by_accession(accession)
    }
}

impl AssayRepository for FailingArchive {
    fn save_assay(&self, assay: &Assay) -> Result<EntityId, LoaderError> {
        self.inner.save_assay(assay)
    }

    fn find_assay_by_accession(&self, accession: &str) -> Result<Option<Assay>, LoaderError> {
        self.inner.find_assay_by_accession(accession)
    }

    fn find_assays_by_project_id(&self, project_id: EntityId) -> Result<Vec<Assay>, LoaderError> {
        self.inner.find_assays_by_project_id(project_id)
    }
}

impl FileRepository for FailingArchive {
    fn save_file(&self, file: &ProjectFile) -> Result<EntityId, LoaderError> {
        let mut saves = self.file_saves.lock().unwrap();
        *saves += 1;
        if *saves == self.fail_file_at {
            return Err(LoaderError::Persistence("disk full".to_string()));
        }
        self.inner.save_file(file)
    }

    fn find_files_by_project_id(
        &self,
        project_id: EntityId,
    ) -> Result<Vec<ProjectFile>, LoaderError> {
        self.inner.find_files_by_project_id(project_id)
    }
}

impl TermRepository for FailingArchive {
    fn save_term(&self, term: NewTerm) -> Result<Term, LoaderError> {
        self.inner.save_term(term)
    }

    fn find_all_terms(&self) -> Result<Vec<Term>, LoaderError> {
        self.inner.find_all_terms()
    }
}

impl UserRepository for FailingArchive {
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, LoaderError> {
        self.inner.find_user_by_email(email)
    }
}

impl Archive for FailingArchive {
    fn begin(&self) -> Result<(), LoaderError> {
        self.inner.begin()
    }

    fn commit(&self) -> Result<(), LoaderError> {
        self.inner.commit()
    }

    fn rollback(&self) -> Result<(), LoaderError> {
        self.inner.rollback()
    }
}

/// In-memory archive with the default submitter registered and an
/// initialized term cache over it.
pub struct Harness {
    pub store: Arc<ArchiveStore>,
    pub terms: TermCache,
    pub readers: MapReaderFactory,
    pub locator: FixedLocator,
    pub submitter: User,
}

impl Harness {
    pub fn new(readers: MapReaderFactory) -> Self {
        let store = Arc::new(ArchiveStore::in_memory());
        let submitter = store
            .register_user(SUBMITTER_EMAIL, "John", "Smith")
            .unwrap();
        let mut terms = TermCache::new(store.clone());
        terms.initialize().unwrap();
        Self {
            store,
            terms,
            readers,
            locator: FixedLocator::default(),
            submitter,
        }
    }

    pub fn load(
        &mut self,
        accession: &str,
        submission: &Submission,
    ) -> Result<Project, SubmissionLoadError> {
        let mut loader = SubmissionLoader::new(
            self.store.as_ref(),
            &mut self.terms,
            &self.readers,
            &self.locator,
        );
        loader.load(accession, None, submission)
    }
}
