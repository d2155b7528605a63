use std::collections::HashSet;

use camino::Utf8PathBuf;
use chrono::Utc;
use tracing::debug;

use crate::domain::{Annotation, AnnotationKind, CvParam, FileRole, Param, TermSet, UserParam};
use crate::error::LoaderError;
use crate::model::{
    Assay, Contact, FileSource, Instrument, InstrumentComponent, LabHead, Project, ProjectFile,
    Reference, Software, User,
};
use crate::scanner::{AssaySummary, ScannedInstrument};
use crate::submission::{ContactDetails, Submission};
use crate::term_cache::TermCache;

pub const INSTRUMENT_MODEL: (&str, &str, &str) = ("MS", "MS:1000031", "instrument model");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub file_id: u32,
    pub path: Utf8PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAssociation {
    pub file: ProjectFile,
    pub assay_accession: Option<String>,
}

pub struct EntityAssembler<'a> {
    terms: &'a mut TermCache,
}

impl<'a> EntityAssembler<'a> {
    pub fn new(terms: &'a mut TermCache) -> Self {
        Self { terms }
    }

    fn annotate(&mut self, kind: AnnotationKind, param: &CvParam) -> Result<Annotation, LoaderError> {
        let term = self.terms.resolve(param)?;
        Ok(Annotation::new(kind, term, param.value.clone()))
    }

    fn annotate_all<'p>(
        &mut self,
        kind: AnnotationKind,
        params: impl IntoIterator<Item = &'p CvParam>,
    ) -> Result<Vec<Annotation>, LoaderError> {
        params
            .into_iter()
            .map(|param| self.annotate(kind, param))
            .collect()
    }

    fn term_set<'p>(
        &mut self,
        kind: AnnotationKind,
        params: impl IntoIterator<Item = &'p CvParam>,
    ) -> Result<TermSet, LoaderError> {
        Ok(self.annotate_all(kind, params)?.into_iter().collect())
    }

    fn split_params(
        &mut self,
        params: &[Param],
    ) -> Result<(Vec<Annotation>, Vec<UserParam>), LoaderError> {
        let mut terms = Vec::new();
        let mut user_params = Vec::new();
        for param in params {
            match param {
                Param::Cv(cv) => terms.push(self.annotate(AnnotationKind::Additional, cv)?),
                Param::User(user) => user_params.push(user.clone()),
            }
        }
        Ok((terms, user_params))
    }

    fn build_instrument(&mut self, scanned: &ScannedInstrument) -> Result<Instrument, LoaderError> {
        let (cv_label, accession, name) = INSTRUMENT_MODEL;
        let model_term = self.terms.get_or_create(cv_label, accession, name)?;
        let model = Annotation::new(
            AnnotationKind::Instrument,
            model_term,
            Some(scanned.configuration_id.clone()),
        );
        let components = scanned
            .components
            .iter()
            .map(|component| {
                Ok(InstrumentComponent {
                    kind: component.kind,
                    order: component.order,
                    terms: self
                        .annotate_all(AnnotationKind::InstrumentComponent, &component.cv_params)?,
                    user_params: component.user_params.clone(),
                })
            })
            .collect::<Result<Vec<_>, LoaderError>>()?;
        Ok(Instrument { model, components })
    }

    pub fn build_assay(&mut self, summary: &AssaySummary) -> Result<Assay, LoaderError> {
        let accession = summary.accession.trim();
        if accession.is_empty() {
            return Err(LoaderError::Validation(format!(
                "assay accession for {} cannot be blank",
                summary.file_name
            )));
        }

        let instrument_configurations = summary
            .instruments
            .iter()
            .map(|scanned| self.build_instrument(scanned))
            .collect::<Result<Vec<_>, LoaderError>>()?;

        let mut software = Vec::with_capacity(summary.software.len());
        for (order, decoded) in summary.software.iter().enumerate() {
            software.push(Software {
                name: decoded.name.clone(),
                version: decoded.version.clone(),
                customization: decoded.customization.clone(),
                order,
                terms: self.annotate_all(AnnotationKind::Software, &decoded.cv_params)?,
                user_params: decoded.user_params.clone(),
            });
        }

        let (additional_terms, additional_user_params) = self.split_params(&summary.additional)?;

        let assay = Assay {
            id: None,
            project_id: None,
            accession: accession.to_string(),
            title: summary.title.clone(),
            short_label: summary.short_label.clone(),
            protein_count: summary.protein_count,
            peptide_count: summary.peptide_count,
            unique_peptide_count: summary.unique_peptide_count,
            identified_spectrum_count: summary.identified_spectrum_count,
            total_spectrum_count: summary.total_spectrum_count,
            ms2_annotation: summary.ms2_annotation,
            chromatogram: summary.chromatogram,
            delta_mz_error_rate: summary.delta_mz_error_rate,
            protein_group_present: summary.protein_group_present,
            example_protein_accession: summary.example_protein_accession.clone(),
            search_database: summary.search_database.clone(),
            experimental_factor: summary.experimental_factor.clone(),
            samples: self.term_set(AnnotationKind::Sample, &summary.samples)?,
            ptms: self.term_set(AnnotationKind::Ptm, &summary.ptms)?,
            quantification_methods: self
                .term_set(AnnotationKind::QuantificationMethod, &summary.quantification_methods)?,
            instruments: self.term_set(AnnotationKind::Instrument, &summary.instrument_models)?,
            instrument_configurations,
            software,
            contacts: dedup_contacts(&summary.contacts),
            additional_terms,
            additional_user_params,
            peak_files: summary.peak_files.clone(),
        };
        debug!(
            assay = %assay.accession,
            samples = assay.samples.len(),
            ptms = assay.ptms.len(),
            "assay built"
        );
        Ok(assay)
    }

    pub fn build_project(
        &mut self,
        accession: &str,
        doi: Option<&str>,
        submitter: &User,
        submission: &Submission,
        assays: &[Assay],
    ) -> Result<Project, LoaderError> {
        let metadata = &submission.project;
        let accession = accession.trim();
        if accession.is_empty() {
            return Err(LoaderError::Validation("project accession cannot be blank".to_string()));
        }

        let mut additional_cv = Vec::new();
        let mut additional_user_params = Vec::new();
        for param in &metadata.additional {
            match param {
                Param::Cv(cv) => additional_cv.push(cv),
                Param::User(user) => additional_user_params.push(user.clone()),
            }
        }

        let now = Utc::now();
        let project = Project {
            id: None,
            accession: accession.to_string(),
            doi: doi.map(str::trim).filter(|doi| !doi.is_empty()).map(str::to_string),
            submitter_id: submitter.id,
            title: metadata.title.trim().to_string(),
            description: metadata.description.clone(),
            sample_processing_protocol: metadata.sample_processing_protocol.clone(),
            data_processing_protocol: metadata.data_processing_protocol.clone(),
            other_omics_link: non_blank(metadata.other_omics_link.as_deref()),
            keywords: metadata.keywords.clone(),
            submission_type: metadata.submission_type,
            submission_date: now,
            update_date: now,
            public_project: false,
            num_assays: assays.len(),
            reanalysis: join_reanalysis(&metadata.reanalysis_accessions),
            lab_heads: metadata.lab_head.as_ref().and_then(lab_head).into_iter().collect(),
            tags: metadata
                .tags
                .iter()
                .filter_map(|tag| non_blank(Some(tag.as_str())))
                .collect(),
            references: build_references(&metadata.pubmed_ids)?,
            experiment_types: self
                .term_set(AnnotationKind::ExperimentType, &metadata.experiment_methods)?,
            additional_terms: self.term_set(AnnotationKind::Additional, additional_cv)?,
            additional_user_params,
            samples: TermSet::new(),
            ptms: TermSet::new(),
            quantification_methods: TermSet::new(),
            instruments: TermSet::new(),
            instrument_configurations: Vec::new(),
            software: Vec::new(),
        };

        if metadata.submission_type.requires_assays() {
            return Ok(assays.iter().fold(project, merge_assay_into_project));
        }

        Ok(Project {
            samples: self.term_set(AnnotationKind::Sample, metadata.sample_params())?,
            instruments: self.term_set(AnnotationKind::Instrument, &metadata.instruments)?,
            ptms: self.term_set(AnnotationKind::Ptm, &metadata.modifications)?,
            quantification_methods: self
                .term_set(AnnotationKind::QuantificationMethod, &metadata.quantifications)?,
            ..project
        })
    }
}

pub fn merge_assay_into_project(project: Project, assay: &Assay) -> Project {
    let mut instrument_configurations = project.instrument_configurations;
    let found: Vec<Instrument> = assay
        .instrument_configurations
        .iter()
        .filter(|item| !instrument_configurations.iter().any(|known| known.key() == item.key()))
        .cloned()
        .collect();
    instrument_configurations.extend(found);

    let mut software = project.software;
    let additions: Vec<Software> = assay
        .software
        .iter()
        .filter(|item| !software.iter().any(|known| known.key() == item.key()))
        .cloned()
        .collect();
    software.extend(additions);

    Project {
        samples: project.samples.union(&assay.samples),
        ptms: project.ptms.union(&assay.ptms),
        quantification_methods: project
            .quantification_methods
            .union(&assay.quantification_methods),
        instruments: project.instruments.union(&assay.instruments),
        instrument_configurations,
        software,
        ..project
    }
}

pub fn build_file_associations(
    submission: &Submission,
    resolved: &[ResolvedFile],
) -> Result<Vec<FileAssociation>, LoaderError> {
    let with_assays = submission.submission_type().requires_assays();
    submission
        .files
        .iter()
        .map(|declared| {
            let found = resolved
                .iter()
                .find(|file| file.file_id == declared.id)
                .ok_or_else(|| LoaderError::FileNotFound(declared.path.to_string()))?;
            let assay_accession = if !with_assays {
                None
            } else if declared.role == FileRole::Result {
                declared.assay_accession()
            } else {
                submission
                    .owning_result_file(declared)
                    .and_then(|result| result.assay_accession())
            };
            Ok(FileAssociation {
                file: ProjectFile {
                    id: None,
                    project_id: None,
                    assay_id: None,
                    role: declared.role,
                    file_name: declared.file_name().to_string(),
                    file_path: declared.path.to_string(),
                    file_size: found.size,
                    source: FileSource::Submitted,
                },
                assay_accession: assay_accession.map(str::to_string),
            })
        })
        .collect()
}

fn build_references(pubmed_ids: &[String]) -> Result<Vec<Reference>, LoaderError> {
    pubmed_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(|id| {
            let pubmed_id = id
                .parse::<u32>()
                .map_err(|_| LoaderError::InvalidPubmedId(id.to_string()))?;
            Ok(Reference {
                pubmed_id,
                doi: None,
                citation: None,
            })
        })
        .collect()
}

fn join_reanalysis(accessions: &[String]) -> Option<String> {
    let joined = accessions
        .iter()
        .map(|accession| accession.trim())
        .filter(|accession| !accession.is_empty())
        .collect::<Vec<_>>()
        .join(",");
    if joined.is_empty() { None } else { Some(joined) }
}

fn lab_head(contact: &ContactDetails) -> Option<LabHead> {
    Some(LabHead {
        name: non_blank(contact.name.as_deref())?,
        email: non_blank(contact.email.as_deref())?,
        affiliation: non_blank(contact.affiliation.as_deref())?,
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn dedup_contacts(contacts: &[Contact]) -> Vec<Contact> {
    let mut seen = HashSet::new();
    contacts
        .iter()
        .filter(|contact| seen.insert(*contact))
        .cloned()
        .collect()
}
