use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::config::default_ptm_vocabularies;
use crate::domain::{CvParam, FileRole, MassSpecFormat, Param, UserParam, decompressed_name};
use crate::error::LoaderError;
use crate::locator::FileLocator;
use crate::mass::{DEFAULT_DELTA_MZ_TOLERANCE, delta_mz, within_tolerance};
use crate::model::{ComponentKind, Contact, PeakFileSummary};
use crate::reader::{
    ComponentDecl, DecodedSoftware, InstrumentConfiguration, Peptide, ReaderFactory, ResultReader,
};
use crate::submission::{DeclaredFile, Submission};

#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    pub delta_mz_tolerance: f64,
    pub ptm_vocabularies: Vec<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            delta_mz_tolerance: DEFAULT_DELTA_MZ_TOLERANCE,
            ptm_vocabularies: default_ptm_vocabularies(),
        }
    }
}

impl ScanSettings {
    pub fn allows_ptm(&self, cv_label: &str) -> bool {
        self.ptm_vocabularies
            .iter()
            .any(|label| label.eq_ignore_ascii_case(cv_label.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedComponent {
    pub kind: ComponentKind,
    pub order: u32,
    pub cv_params: Vec<CvParam>,
    pub user_params: Vec<UserParam>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedInstrument {
    pub configuration_id: String,
    pub components: Vec<ScannedComponent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssaySummary {
    pub file_id: u32,
    pub file_name: String,
    pub accession: String,
    pub title: Option<String>,
    pub short_label: Option<String>,
    pub protein_count: u64,
    pub peptide_count: u64,
    pub total_spectrum_count: u64,
    pub unique_peptide_count: u64,
    pub identified_spectrum_count: u64,
    pub ms2_annotation: bool,
    pub chromatogram: bool,
    pub delta_mz_error_rate: f64,
    pub protein_group_present: bool,
    pub example_protein_accession: Option<String>,
    pub search_database: Option<String>,
    pub experimental_factor: Option<String>,
    pub ptms: Vec<CvParam>,
    pub instruments: Vec<ScannedInstrument>,
    pub software: Vec<DecodedSoftware>,
    pub contacts: Vec<Contact>,
    pub samples: Vec<CvParam>,
    pub quantification_methods: Vec<CvParam>,
    pub instrument_models: Vec<CvParam>,
    pub additional: Vec<Param>,
    pub peak_files: Vec<PeakFileSummary>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PsmTally {
    pub total: u64,
    pub errors: u64,
}

impl PsmTally {
    pub fn record(&mut self, is_error: bool) {
        self.total += 1;
        if is_error {
            self.errors += 1;
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.errors as f64 / self.total as f64
        }
    }
}

pub fn resolve_precursor(peptide: &Peptide) -> Option<(i32, f64)> {
    let spectrum = peptide.spectrum.as_ref();
    let charge = peptide
        .precursor_charge
        .filter(|z| *z != 0)
        .or_else(|| spectrum.and_then(|s| s.precursor_charge).filter(|z| *z != 0))?;
    let usable = |mz: &f64| mz.is_finite() && *mz > 0.0;
    let mz = peptide
        .precursor_mz
        .filter(usable)
        .or_else(|| spectrum.and_then(|s| s.precursor_mz).filter(usable))?;
    Some((charge, mz))
}

#[derive(Debug, Default)]
struct EntryTally {
    sequences: HashSet<String>,
    spectra: HashSet<String>,
    ptm_accessions: HashSet<String>,
    ptms: Vec<CvParam>,
    psms: PsmTally,
    ms2_annotation: bool,
}

impl EntryTally {
    fn observe(&mut self, peptide: &Peptide, settings: &ScanSettings) {
        self.sequences.insert(peptide.sequence.clone());

        for modification in &peptide.modifications {
            for param in &modification.cv_params {
                if settings.allows_ptm(&param.cv_label)
                    && self.ptm_accessions.insert(param.accession.clone())
                {
                    self.ptms.push(param.clone());
                }
            }
        }

        let is_error = match resolve_precursor(peptide) {
            None => true,
            Some((charge, mz)) => {
                let ptm_masses: Vec<f64> = peptide
                    .modifications
                    .iter()
                    .filter_map(|modification| modification.mass_delta)
                    .collect();
                match delta_mz(&peptide.sequence, mz, charge, &ptm_masses) {
                    Some(delta) => !within_tolerance(delta, settings.delta_mz_tolerance),
                    None => true,
                }
            }
        };
        self.psms.record(is_error);

        if let Some(spectrum) = &peptide.spectrum {
            self.spectra.insert(spectrum.id.clone());
        }
        if peptide.fragment_ion_count > 0 {
            self.ms2_annotation = true;
        }
    }
}

pub struct ResultScanner<'a> {
    readers: &'a dyn ReaderFactory,
    locator: &'a dyn FileLocator,
    settings: &'a ScanSettings,
}

impl<'a> ResultScanner<'a> {
    pub fn new(
        readers: &'a dyn ReaderFactory,
        locator: &'a dyn FileLocator,
        settings: &'a ScanSettings,
    ) -> Self {
        Self {
            readers,
            locator,
            settings,
        }
    }

    pub fn scan_submission(&self, submission: &Submission) -> Result<Vec<AssaySummary>, LoaderError> {
        if !submission.submission_type().requires_assays() {
            return Ok(Vec::new());
        }
        submission
            .result_files()
            .map(|file| self.scan(submission, file))
            .collect()
    }

    pub fn scan(
        &self,
        submission: &Submission,
        file: &DeclaredFile,
    ) -> Result<AssaySummary, LoaderError> {
        let accession = file.assay_accession().ok_or_else(|| {
            LoaderError::Validation(format!("result file {} has no assay accession", file.path))
        })?;
        let path = self.locator.resolve(&file.path)?;
        let format = MassSpecFormat::from_file_name(file.file_name());
        info!(file = %file.path, %format, assay = accession, "scanning result file");

        let mut reader = self
            .readers
            .open(&path, format)
            .map_err(|err| scan_error(file, err))?;
        let outcome = self.scan_reader(submission, file, accession, format, reader.as_ref());
        let closed = reader.close();
        let summary = outcome.map_err(|err| scan_error(file, err))?;
        closed.map_err(|err| scan_error(file, err))?;

        debug!(
            assay = accession,
            proteins = summary.protein_count,
            unique_peptides = summary.unique_peptide_count,
            identified_spectra = summary.identified_spectrum_count,
            error_rate = summary.delta_mz_error_rate,
            "scan finished"
        );
        Ok(summary)
    }

    fn scan_reader(
        &self,
        submission: &Submission,
        file: &DeclaredFile,
        accession: &str,
        format: MassSpecFormat,
        reader: &dyn ResultReader,
    ) -> Result<AssaySummary, LoaderError> {
        let metadata = reader.experiment_metadata()?;
        let hints = submission.sample_hints(file);
        if hints.experimental_factors.len() > 1 {
            warn!(
                file = %file.path,
                count = hints.experimental_factors.len(),
                "several experimental factors declared, only the first is kept"
            );
        }
        let experimental_factor = hints
            .experimental_factors
            .first()
            .map(|factor| factor.value.clone().unwrap_or_else(|| factor.name.clone()));

        let instruments = reader
            .instrument_configurations()?
            .iter()
            .map(scan_instrument)
            .collect();
        let software = dedup_software(reader.software_list()?);
        let contacts = dedup_contacts(reader.person_contacts()?);

        let protein_ids = reader.protein_ids()?;
        let protein_group_present = reader.has_protein_groups()?;
        let (example_protein_accession, search_database) = match protein_ids.first() {
            Some(first) => (reader.protein_accession(first)?, reader.search_database(first)?),
            None => (None, None),
        };

        let mut tally = EntryTally::default();
        for protein_id in &protein_ids {
            for peptide_id in reader.peptide_ids(protein_id)? {
                let peptide = reader.peptide_at(protein_id, &peptide_id)?;
                tally.observe(&peptide, self.settings);
            }
        }

        let chromatogram = self.detect_chromatogram(submission, file)?;
        let peak_files = if format.externalizes_spectra() {
            self.check_peak_files(submission, file, reader)?
        } else {
            Vec::new()
        };

        Ok(AssaySummary {
            file_id: file.id,
            file_name: file.file_name().to_string(),
            accession: accession.to_string(),
            title: metadata.title,
            short_label: metadata.short_label,
            protein_count: reader.number_of_proteins()?,
            peptide_count: reader.number_of_peptides()?,
            total_spectrum_count: reader.number_of_spectra()?,
            unique_peptide_count: tally.sequences.len() as u64,
            identified_spectrum_count: tally.spectra.len() as u64,
            ms2_annotation: tally.ms2_annotation,
            chromatogram,
            delta_mz_error_rate: tally.psms.error_rate(),
            protein_group_present,
            example_protein_accession,
            search_database,
            experimental_factor,
            ptms: tally.ptms,
            instruments,
            software,
            contacts,
            samples: hints.sample_params().cloned().collect(),
            quantification_methods: hints.quantifications,
            instrument_models: hints.instruments,
            additional: reader.additional_terms()?,
            peak_files,
        })
    }

    fn detect_chromatogram(
        &self,
        submission: &Submission,
        file: &DeclaredFile,
    ) -> Result<bool, LoaderError> {
        for mapped in submission.mapped_files(file) {
            let format = MassSpecFormat::from_file_name(mapped.file_name());
            if !format.carries_chromatograms() {
                continue;
            }
            let path = self.locator.resolve(&mapped.path)?;
            if self.readers.chromatogram_count(&path, format)? > 0 {
                debug!(file = %mapped.path, "chromatograms found");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn check_peak_files(
        &self,
        submission: &Submission,
        file: &DeclaredFile,
        reader: &dyn ResultReader,
    ) -> Result<Vec<PeakFileSummary>, LoaderError> {
        let mut summaries = Vec::new();
        for source in reader.spectra_sources()? {
            let name = source.file_name();
            let real = decompressed_name(name);
            let missing = !submission
                .mapped_files(file)
                .filter(|mapped| mapped.role == FileRole::Peak)
                .any(|mapped| decompressed_name(mapped.file_name()).eq_ignore_ascii_case(real));
            if missing {
                warn!(file = %file.path, peak_file = name, "referenced peak file was not submitted");
            }
            summaries.push(PeakFileSummary {
                file_name: name.to_string(),
                missing,
                spectrum_count: source.spectrum_count,
            });
        }
        Ok(summaries)
    }
}

fn scan_error(file: &DeclaredFile, err: LoaderError) -> LoaderError {
    match err {
        LoaderError::Scan { .. } => err,
        other => LoaderError::Scan {
            file: file.path.to_string(),
            message: other.to_string(),
        },
    }
}

fn scan_instrument(configuration: &InstrumentConfiguration) -> ScannedInstrument {
    let chain = [
        (ComponentKind::Source, &configuration.sources),
        (ComponentKind::Analyzer, &configuration.analyzers),
        (ComponentKind::Detector, &configuration.detectors),
    ];
    let components = chain
        .into_iter()
        .flat_map(|(kind, declared)| declared.iter().map(move |decl| (kind, decl)))
        .zip(1u32..)
        .map(|((kind, decl), order)| component(kind, order, decl))
        .collect();
    ScannedInstrument {
        configuration_id: configuration.id.clone(),
        components,
    }
}

fn component(kind: ComponentKind, order: u32, decl: &ComponentDecl) -> ScannedComponent {
    ScannedComponent {
        kind,
        order,
        cv_params: decl.cv_params.clone(),
        user_params: decl.user_params.clone(),
    }
}

fn dedup_software(software: Vec<DecodedSoftware>) -> Vec<DecodedSoftware> {
    let mut seen = HashSet::new();
    software
        .into_iter()
        .filter(|item| seen.insert((item.name.clone(), item.version.clone())))
        .collect()
}

fn dedup_contacts(contacts: Vec<Contact>) -> Vec<Contact> {
    let mut seen = HashSet::new();
    contacts
        .into_iter()
        .filter(|contact| seen.insert(contact.clone()))
        .collect()
}
