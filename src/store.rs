use std::fs;
use std::io::Write;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tempfile::Builder;
use tracing::debug;

use crate::domain::{EntityId, NewTerm, Term};
use crate::error::LoaderError;
use crate::model::{Assay, Project, ProjectFile, User};
use crate::repository::{
    Archive, AssayRepository, FileRepository, ProjectRepository, TermRepository, UserRepository,
};

pub const CATALOG_FILE: &str = "catalog.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Catalog {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    terms: Vec<Term>,
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    assays: Vec<Assay>,
    #[serde(default)]
    files: Vec<ProjectFile>,
}

impl Catalog {
    fn allocate(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId::new(self.next_id)
    }

    fn has_project(&self, id: EntityId) -> bool {
        self.projects.iter().any(|project| project.id == Some(id))
    }

    fn has_assay(&self, id: EntityId) -> bool {
        self.assays.iter().any(|assay| assay.id == Some(id))
    }
}

#[derive(Debug, Default)]
struct StoreState {
    committed: Catalog,
    staged: Option<Catalog>,
    owner: Option<ThreadId>,
}

impl StoreState {
    fn owned_by_current(&self) -> bool {
        self.staged.is_some() && self.owner == Some(thread::current().id())
    }
}

// A transaction belongs to the thread that began it. Other threads read the
// committed catalog and their writes wait until it ends.
#[derive(Debug)]
pub struct ArchiveStore {
    root: Option<Utf8PathBuf>,
    state: Mutex<StoreState>,
    idle: Condvar,
}

impl ArchiveStore {
    pub fn in_memory() -> Self {
        Self {
            root: None,
            state: Mutex::new(StoreState::default()),
            idle: Condvar::new(),
        }
    }

    pub fn open(root: Utf8PathBuf) -> Result<Self, LoaderError> {
        fs::create_dir_all(root.as_std_path())
            .map_err(|err| LoaderError::Filesystem(err.to_string()))?;
        let path = root.join(CATALOG_FILE);
        let committed = if path.as_std_path().exists() {
            let content = fs::read_to_string(path.as_std_path())
                .map_err(|err| LoaderError::Filesystem(err.to_string()))?;
            serde_json::from_str(&content)
                .map_err(|err| LoaderError::Persistence(format!("corrupt catalog {path}: {err}")))?
        } else {
            Catalog::default()
        };
        debug!(root = %root, "opened archive catalog");
        Ok(Self {
            root: Some(root),
            state: Mutex::new(StoreState {
                committed,
                staged: None,
                owner: None,
            }),
            idle: Condvar::new(),
        })
    }

    pub fn root(&self) -> Option<&Utf8Path> {
        self.root.as_deref()
    }

    pub fn in_transaction(&self) -> bool {
        self.lock().map(|state| state.owned_by_current()).unwrap_or(false)
    }

    pub fn register_user(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User, LoaderError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(LoaderError::Validation("user email cannot be blank".to_string()));
        }
        self.write(|catalog| {
            if catalog
                .users
                .iter()
                .any(|user| user.email.eq_ignore_ascii_case(email))
            {
                return Err(LoaderError::Persistence(format!(
                    "user email already registered: {email}"
                )));
            }
            let user = User {
                id: catalog.allocate(),
                email: email.to_string(),
                first_name: first_name.trim().to_string(),
                last_name: last_name.trim().to_string(),
            };
            catalog.users.push(user.clone());
            Ok(user)
        })
    }

    pub fn projects(&self) -> Result<Vec<Project>, LoaderError> {
        self.read(|catalog| catalog.projects.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, LoaderError> {
        self.state
            .lock()
            .map_err(|_| LoaderError::Persistence("archive lock poisoned".to_string()))
    }

    fn lock_idle(&self) -> Result<MutexGuard<'_, StoreState>, LoaderError> {
        let state = self.lock()?;
        self.idle
            .wait_while(state, |state| state.staged.is_some() && !state.owned_by_current())
            .map_err(|_| LoaderError::Persistence("archive lock poisoned".to_string()))
    }

    fn read<T>(&self, f: impl FnOnce(&Catalog) -> T) -> Result<T, LoaderError> {
        let state = self.lock()?;
        let view = match &state.staged {
            Some(staged) if state.owned_by_current() => staged,
            _ => &state.committed,
        };
        Ok(f(view))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut Catalog) -> Result<T, LoaderError>,
    ) -> Result<T, LoaderError> {
        let mut state = self.lock_idle()?;
        if let Some(staged) = state.staged.as_mut() {
            return f(staged);
        }
        let mut next = state.committed.clone();
        let value = f(&mut next)?;
        self.flush(&next)?;
        state.committed = next;
        Ok(value)
    }

    fn flush(&self, catalog: &Catalog) -> Result<(), LoaderError> {
        let Some(root) = &self.root else {
            return Ok(());
        };
        let content = serde_json::to_vec_pretty(catalog)
            .map_err(|err| LoaderError::Persistence(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix("prider-catalog")
            .tempfile_in(root.as_std_path())
            .map_err(|err| LoaderError::Filesystem(err.to_string()))?;
        temp.write_all(&content)
            .map_err(|err| LoaderError::Filesystem(err.to_string()))?;
        temp.persist(root.join(CATALOG_FILE).as_std_path())
            .map_err(|err| LoaderError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

impl ProjectRepository for ArchiveStore {
    fn save_project(&self, project: &Project) -> Result<EntityId, LoaderError> {
        self.write(|catalog| {
            if catalog
                .projects
                .iter()
                .any(|existing| existing.accession == project.accession)
            {
                return Err(LoaderError::Persistence(format!(
                    "unique constraint: project accession {}",
                    project.accession
                )));
            }
            if !catalog.users.iter().any(|user| user.id == project.submitter_id) {
                return Err(LoaderError::Persistence(format!(
                    "foreign key: submitter {} does not exist",
                    project.submitter_id
                )));
            }
            let id = catalog.allocate();
            let mut stored = project.clone();
            stored.id = Some(id);
            catalog.projects.push(stored);
            Ok(id)
        })
    }

    fn find_project_by_accession(&self, accession: &str) -> Result<Option<Project>, LoaderError> {
        self.read(|catalog| {
            catalog
                .projects
                .iter()
                .find(|project| project.accession == accession)
                .cloned()
        })
    }
}

impl AssayRepository for ArchiveStore {
    fn save_assay(&self, assay: &Assay) -> Result<EntityId, LoaderError> {
        self.write(|catalog| {
            if catalog
                .assays
                .iter()
                .any(|existing| existing.accession == assay.accession)
            {
                return Err(LoaderError::Persistence(format!(
                    "unique constraint: assay accession {}",
                    assay.accession
                )));
            }
            match assay.project_id {
                Some(project_id) if catalog.has_project(project_id) => {}
                other => {
                    return Err(LoaderError::Persistence(format!(
                        "foreign key: assay {} references missing project {other:?}",
                        assay.accession
                    )));
                }
            }
            let id = catalog.allocate();
            let mut stored = assay.clone();
            stored.id = Some(id);
            catalog.assays.push(stored);
            Ok(id)
        })
    }

    fn find_assay_by_accession(&self, accession: &str) -> Result<Option<Assay>, LoaderError> {
        self.read(|catalog| {
            catalog
                .assays
                .iter()
                .find(|assay| assay.accession == accession)
                .cloned()
        })
    }

    fn find_assays_by_project_id(&self, project_id: EntityId) -> Result<Vec<Assay>, LoaderError> {
        self.read(|catalog| {
            catalog
                .assays
                .iter()
                .filter(|assay| assay.project_id == Some(project_id))
                .cloned()
                .collect()
        })
    }
}

impl FileRepository for ArchiveStore {
    fn save_file(&self, file: &ProjectFile) -> Result<EntityId, LoaderError> {
        self.write(|catalog| {
            match file.project_id {
                Some(project_id) if catalog.has_project(project_id) => {}
                other => {
                    return Err(LoaderError::Persistence(format!(
                        "foreign key: file {} references missing project {other:?}",
                        file.file_name
                    )));
                }
            }
            if let Some(assay_id) = file.assay_id
                && !catalog.has_assay(assay_id)
            {
                return Err(LoaderError::Persistence(format!(
                    "foreign key: file {} references missing assay {assay_id}",
                    file.file_name
                )));
            }
            let id = catalog.allocate();
            let mut stored = file.clone();
            stored.id = Some(id);
            catalog.files.push(stored);
            Ok(id)
        })
    }

    fn find_files_by_project_id(
        &self,
        project_id: EntityId,
    ) -> Result<Vec<ProjectFile>, LoaderError> {
        self.read(|catalog| {
            catalog
                .files
                .iter()
                .filter(|file| file.project_id == Some(project_id))
                .cloned()
                .collect()
        })
    }
}

impl TermRepository for ArchiveStore {
    fn save_term(&self, term: NewTerm) -> Result<Term, LoaderError> {
        self.write(|catalog| {
            if catalog
                .terms
                .iter()
                .any(|existing| existing.accession == term.accession)
            {
                return Err(LoaderError::Persistence(format!(
                    "unique constraint: term accession {}",
                    term.accession
                )));
            }
            let stored = Term {
                id: catalog.allocate(),
                cv_label: term.cv_label,
                accession: term.accession,
                name: term.name,
            };
            catalog.terms.push(stored.clone());
            Ok(stored)
        })
    }

    fn find_all_terms(&self) -> Result<Vec<Term>, LoaderError> {
        self.read(|catalog| catalog.terms.clone())
    }
}

impl UserRepository for ArchiveStore {
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, LoaderError> {
        let email = email.trim();
        self.read(|catalog| {
            catalog
                .users
                .iter()
                .find(|user| user.email.eq_ignore_ascii_case(email))
                .cloned()
        })
    }
}

impl Archive for ArchiveStore {
    fn begin(&self) -> Result<(), LoaderError> {
        let mut state = self.lock_idle()?;
        if state.staged.is_some() {
            return Err(LoaderError::Persistence(
                "a transaction is already open".to_string(),
            ));
        }
        state.staged = Some(state.committed.clone());
        state.owner = Some(thread::current().id());
        Ok(())
    }

    fn commit(&self) -> Result<(), LoaderError> {
        let mut state = self.lock()?;
        if !state.owned_by_current() {
            return Err(LoaderError::Persistence("no open transaction".to_string()));
        }
        let Some(staged) = state.staged.take() else {
            return Err(LoaderError::Persistence("no open transaction".to_string()));
        };
        state.owner = None;
        let flushed = self.flush(&staged);
        if flushed.is_ok() {
            state.committed = staged;
        }
        self.idle.notify_all();
        flushed
    }

    fn rollback(&self) -> Result<(), LoaderError> {
        let mut state = self.lock()?;
        if state.owned_by_current() {
            state.staged = None;
            state.owner = None;
            self.idle.notify_all();
        }
        Ok(())
    }
}
