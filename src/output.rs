use std::io::{self, Write};

use serde::Serialize;

use crate::domain::TermSet;
use crate::model::{Assay, Project, ProjectFile, Software, User};

#[derive(Debug, Clone, Serialize)]
pub struct AssayReport {
    pub accession: String,
    pub proteins: u64,
    pub peptides: u64,
    pub unique_peptides: u64,
    pub identified_spectra: u64,
    pub total_spectra: u64,
    pub delta_mz_error_rate: f64,
    pub ms2_annotation: bool,
    pub chromatogram: bool,
    pub software: Vec<String>,
    pub missing_peak_files: Vec<String>,
}

impl From<&Assay> for AssayReport {
    fn from(assay: &Assay) -> Self {
        Self {
            accession: assay.accession.clone(),
            proteins: assay.protein_count,
            peptides: assay.peptide_count,
            unique_peptides: assay.unique_peptide_count,
            identified_spectra: assay.identified_spectrum_count,
            total_spectra: assay.total_spectrum_count,
            delta_mz_error_rate: assay.delta_mz_error_rate,
            ms2_annotation: assay.ms2_annotation,
            chromatogram: assay.chromatogram,
            software: assay.software.iter().map(Software::display_name).collect(),
            missing_peak_files: assay
                .peak_files
                .iter()
                .filter(|peak| peak.missing)
                .map(|peak| peak.file_name.clone())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub project_accession: String,
    pub project_id: Option<u64>,
    pub submission_type: String,
    pub num_assays: usize,
    pub assays: Vec<AssayReport>,
    pub files: usize,
    pub samples: Vec<String>,
    pub ptms: Vec<String>,
    pub instruments: Vec<String>,
    pub instrument_configurations: Vec<String>,
}

impl LoadReport {
    pub fn new(project: &Project, assays: &[Assay], files: &[ProjectFile]) -> Self {
        let accessions = |set: &TermSet| -> Vec<String> {
            set.accessions().into_iter().map(str::to_string).collect()
        };
        Self {
            project_accession: project.accession.clone(),
            project_id: project.id.map(|id| id.get()),
            submission_type: project.submission_type.to_string(),
            num_assays: project.num_assays,
            assays: assays.iter().map(AssayReport::from).collect(),
            files: files.len(),
            samples: accessions(&project.samples),
            ptms: accessions(&project.ptms),
            instruments: accessions(&project.instruments),
            instrument_configurations: project
                .instrument_configurations
                .iter()
                .filter_map(|instrument| instrument.model.value.clone())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectView {
    pub project: Project,
    pub assays: Vec<Assay>,
    pub files: Vec<ProjectFile>,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_load(report: &LoadReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_project(view: &ProjectView) -> io::Result<()> {
        Self::print_json(view)
    }

    pub fn print_user(user: &User) -> io::Result<()> {
        Self::print_json(user)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
