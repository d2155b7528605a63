use crate::domain::{EntityId, NewTerm, Term};
use crate::error::LoaderError;
use crate::model::{Assay, Project, ProjectFile, User};

pub trait ProjectRepository: Send + Sync {
    fn save_project(&self, project: &Project) -> Result<EntityId, LoaderError>;
    fn find_project_by_accession(&self, accession: &str) -> Result<Option<Project>, LoaderError>;
}

pub trait AssayRepository: Send + Sync {
    fn save_assay(&self, assay: &Assay) -> Result<EntityId, LoaderError>;
    fn find_assay_by_accession(&self, accession: &str) -> Result<Option<Assay>, LoaderError>;
    fn find_assays_by_project_id(&self, project_id: EntityId) -> Result<Vec<Assay>, LoaderError>;
}

pub trait FileRepository: Send + Sync {
    fn save_file(&self, file: &ProjectFile) -> Result<EntityId, LoaderError>;
    fn find_files_by_project_id(
        &self,
        project_id: EntityId,
    ) -> Result<Vec<ProjectFile>, LoaderError>;
}

pub trait TermRepository: Send + Sync {
    fn save_term(&self, term: NewTerm) -> Result<Term, LoaderError>;
    fn find_all_terms(&self) -> Result<Vec<Term>, LoaderError>;
}

pub trait UserRepository: Send + Sync {
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, LoaderError>;
}

pub trait Archive:
    ProjectRepository + AssayRepository + FileRepository + TermRepository + UserRepository
{
    fn begin(&self) -> Result<(), LoaderError>;
    fn commit(&self) -> Result<(), LoaderError>;
    fn rollback(&self) -> Result<(), LoaderError>;
}
