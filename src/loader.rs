use std::collections::{HashMap, HashSet};

use tracing::{debug, error, info, warn};

use crate::assembler::{EntityAssembler, FileAssociation, ResolvedFile, build_file_associations};
use crate::citation::{CitationResolver, enrich_references};
use crate::domain::{Accession, EntityId};
use crate::error::{LoaderError, SubmissionLoadError};
use crate::locator::FileLocator;
use crate::model::{Assay, Project, User};
use crate::reader::ReaderFactory;
use crate::repository::Archive;
use crate::scanner::{ResultScanner, ScanSettings};
use crate::submission::Submission;
use crate::term_cache::TermCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Start,
    Validate,
    Assemble,
    Persist,
    Committed,
    RolledBack,
}

impl LoadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadState::Committed | LoadState::RolledBack)
    }
}

struct Validated {
    accession: Accession,
    submitter: User,
    files: Vec<ResolvedFile>,
}

struct Assembled {
    project: Project,
    assays: Vec<Assay>,
    files: Vec<FileAssociation>,
}

pub struct SubmissionLoader<'a, A: Archive + ?Sized> {
    archive: &'a A,
    terms: &'a mut TermCache,
    readers: &'a dyn ReaderFactory,
    locator: &'a dyn FileLocator,
    citations: Option<&'a dyn CitationResolver>,
    settings: ScanSettings,
    state: LoadState,
}

impl<'a, A: Archive + ?Sized> SubmissionLoader<'a, A> {
    pub fn new(
        archive: &'a A,
        terms: &'a mut TermCache,
        readers: &'a dyn ReaderFactory,
        locator: &'a dyn FileLocator,
    ) -> Self {
        Self {
            archive,
            terms,
            readers,
            locator,
            citations: None,
            settings: ScanSettings::default(),
            state: LoadState::Start,
        }
    }

    pub fn with_citations(mut self, citations: &'a dyn CitationResolver) -> Self {
        self.citations = Some(citations);
        self
    }

    pub fn with_scan_settings(mut self, settings: ScanSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn load(
        &mut self,
        project_accession: &str,
        doi: Option<&str>,
        submission: &Submission,
    ) -> Result<Project, SubmissionLoadError> {
        if self.state != LoadState::Start {
            return Err(SubmissionLoadError::new(
                project_accession,
                LoaderError::Validation(format!("loader already used, state {:?}", self.state)),
            ));
        }
        info!(
            project = project_accession,
            submission_type = %submission.submission_type(),
            files = submission.files.len(),
            "loading submission"
        );

        if !self.terms.is_initialized()
            && let Err(err) = self.terms.initialize()
        {
            self.state = LoadState::RolledBack;
            return Err(SubmissionLoadError::new(project_accession, err));
        }
        if let Err(err) = self.archive.begin() {
            self.state = LoadState::RolledBack;
            return Err(SubmissionLoadError::new(project_accession, err));
        }

        let outcome = self
            .run(project_accession, doi, submission)
            .and_then(|project| self.archive.commit().map(|_| project));
        match outcome {
            Ok(project) => {
                self.state = LoadState::Committed;
                info!(
                    project = %project.accession,
                    assays = project.num_assays,
                    "submission committed"
                );
                Ok(project)
            }
            Err(err) => Err(self.roll_back(project_accession, err)),
        }
    }

    fn roll_back(&mut self, project_accession: &str, cause: LoaderError) -> SubmissionLoadError {
        error!(
            project = project_accession,
            state = ?self.state,
            error = %cause,
            "load failed, rolling back"
        );
        if let Err(err) = self.archive.rollback() {
            error!(error = %err, "rollback failed");
        }
        if let Err(err) = self.terms.initialize() {
            warn!(error = %err, "term cache could not be reloaded after rollback");
        }
        self.state = LoadState::RolledBack;
        SubmissionLoadError::new(project_accession, cause)
    }

    fn run(
        &mut self,
        project_accession: &str,
        doi: Option<&str>,
        submission: &Submission,
    ) -> Result<Project, LoaderError> {
        self.enter(LoadState::Validate);
        let validated = self.validate(project_accession, submission)?;

        self.enter(LoadState::Assemble);
        let assembled = self.assemble(&validated, doi, submission)?;

        self.enter(LoadState::Persist);
        self.persist(assembled, submission)
    }

    fn enter(&mut self, state: LoadState) {
        debug!(from = ?self.state, to = ?state, "load state");
        self.state = state;
    }

    fn validate(
        &self,
        project_accession: &str,
        submission: &Submission,
    ) -> Result<Validated, LoaderError> {
        submission.validate()?;
        let accession: Accession = project_accession.parse()?;

        let email = submission.project.contact_email().ok_or_else(|| {
            LoaderError::Validation("submitter contact email is missing".to_string())
        })?;
        let submitter = self
            .archive
            .find_user_by_email(email)?
            .ok_or_else(|| LoaderError::SubmitterNotFound(email.to_string()))?;

        if self
            .archive
            .find_project_by_accession(accession.as_str())?
            .is_some()
        {
            return Err(LoaderError::Conflict {
                kind: "project",
                accession: accession.to_string(),
            });
        }

        if submission.submission_type().requires_assays() {
            let mut seen = HashSet::new();
            for file in submission.result_files() {
                let assay = file.assay_accession().ok_or_else(|| {
                    LoaderError::Validation(format!(
                        "result file {} has no assay accession",
                        file.path
                    ))
                })?;
                if !seen.insert(assay) {
                    return Err(LoaderError::Validation(format!(
                        "assay accession {assay} is declared twice"
                    )));
                }
                if self.archive.find_assay_by_accession(assay)?.is_some() {
                    return Err(LoaderError::Conflict {
                        kind: "assay",
                        accession: assay.to_string(),
                    });
                }
            }
        }

        let files = submission
            .files
            .iter()
            .map(|file| {
                let path = self.locator.resolve(&file.path)?;
                let size = self.locator.file_size(&path)?;
                Ok(ResolvedFile {
                    file_id: file.id,
                    path,
                    size,
                })
            })
            .collect::<Result<Vec<_>, LoaderError>>()?;

        Ok(Validated {
            accession,
            submitter,
            files,
        })
    }

    fn assemble(
        &mut self,
        validated: &Validated,
        doi: Option<&str>,
        submission: &Submission,
    ) -> Result<Assembled, LoaderError> {
        let scanner = ResultScanner::new(self.readers, self.locator, &self.settings);
        let summaries = scanner.scan_submission(submission)?;

        let mut assembler = EntityAssembler::new(&mut *self.terms);
        let assays = summaries
            .iter()
            .map(|summary| assembler.build_assay(summary))
            .collect::<Result<Vec<_>, LoaderError>>()?;
        let mut project = assembler.build_project(
            validated.accession.as_str(),
            doi,
            &validated.submitter,
            submission,
            &assays,
        )?;

        if let Some(citations) = self.citations {
            enrich_references(citations, &mut project.references);
        }
        let files = build_file_associations(submission, &validated.files)?;

        Ok(Assembled {
            project,
            assays,
            files,
        })
    }

    fn persist(
        &self,
        assembled: Assembled,
        submission: &Submission,
    ) -> Result<Project, LoaderError> {
        let Assembled {
            mut project,
            assays,
            files,
        } = assembled;

        let project_id = self.archive.save_project(&project)?;
        project.id = Some(project_id);

        let mut assay_ids: HashMap<String, EntityId> = HashMap::new();
        for mut assay in assays {
            assay.project_id = Some(project_id);
            let assay_id = self.archive.save_assay(&assay)?;
            assay_ids.insert(assay.accession.clone(), assay_id);
        }

        let with_assays = submission.submission_type().requires_assays();
        for association in files {
            let mut file = association.file;
            file.project_id = Some(project_id);
            file.assay_id = match association.assay_accession {
                Some(accession) if with_assays => {
                    let assay_id = assay_ids.get(&accession).copied().ok_or_else(|| {
                        LoaderError::Validation(format!(
                            "file {} refers to unknown assay {accession}",
                            file.file_name
                        ))
                    })?;
                    Some(assay_id)
                }
                _ => None,
            };
            self.archive.save_file(&file)?;
        }

        debug!(
            project = %project.accession,
            assays = assay_ids.len(),
            "project persisted"
        );
        Ok(project)
    }
}
