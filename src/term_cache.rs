use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{CvParam, NewTerm, Term};
use crate::error::LoaderError;
use crate::repository::TermRepository;

// Re-initialize after a failed load: it may hold rolled-back terms.
pub struct TermCache {
    repository: Arc<dyn TermRepository>,
    terms: HashMap<String, Term>,
    initialized: bool,
}

impl TermCache {
    pub fn new(repository: Arc<dyn TermRepository>) -> Self {
        Self {
            repository,
            terms: HashMap::new(),
            initialized: false,
        }
    }

    pub fn initialize(&mut self) -> Result<(), LoaderError> {
        self.terms.clear();
        self.initialized = false;
        let terms = self
            .repository
            .find_all_terms()
            .map_err(|err| LoaderError::Cache(format!("bulk load failed: {err}")))?;
        for term in terms {
            self.terms.entry(term.accession.clone()).or_insert(term);
        }
        self.initialized = true;
        debug!(count = self.terms.len(), "term cache initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn lookup(&self, accession: &str) -> Option<&Term> {
        self.terms.get(accession)
    }

    pub fn get_or_create(
        &mut self,
        cv_label: &str,
        accession: &str,
        name: &str,
    ) -> Result<Term, LoaderError> {
        if !self.initialized {
            return Err(LoaderError::Cache("term cache used before initialize".to_string()));
        }
        if let Some(term) = self.terms.get(accession) {
            return Ok(term.clone());
        }
        let (cv_label, accession, name) = (cv_label.trim(), accession.trim(), name.trim());
        if cv_label.is_empty() || accession.is_empty() || name.is_empty() {
            return Err(LoaderError::Validation(format!(
                "term fields cannot be blank: label={cv_label:?} accession={accession:?} name={name:?}"
            )));
        }
        if let Some(term) = self.terms.get(accession) {
            return Ok(term.clone());
        }

        info!(cv_label, accession, name, "storing new term");
        let term = self.repository.save_term(NewTerm {
            cv_label: cv_label.to_string(),
            accession: accession.to_string(),
            name: name.to_string(),
        })?;
        self.terms.insert(term.accession.clone(), term.clone());
        Ok(term)
    }

    pub fn resolve(&mut self, param: &CvParam) -> Result<Term, LoaderError> {
        self.get_or_create(&param.cv_label, &param.accession, &param.name)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::store::ArchiveStore;

    fn cache() -> TermCache {
        let mut cache = TermCache::new(Arc::new(ArchiveStore::in_memory()));
        cache.initialize().unwrap();
        cache
    }

    #[test]
    fn blank_fields_are_rejected() {
        let mut cache = cache();
        let err = cache.get_or_create("MS", "MS:1000031", "  ").unwrap_err();
        assert_matches!(err, LoaderError::Validation(_));
        assert!(cache.is_empty());
    }

    #[test]
    fn use_before_initialize_fails() {
        let mut cache = TermCache::new(Arc::new(ArchiveStore::in_memory()));
        let err = cache.get_or_create("MS", "MS:1000031", "instrument model").unwrap_err();
        assert_matches!(err, LoaderError::Cache(_));
    }

    #[test]
    fn lookup_is_pure() {
        let mut cache = cache();
        assert!(cache.lookup("MOD:00719").is_none());
        let term = cache.get_or_create("MOD", "MOD:00719", "L-methionine sulfoxide").unwrap();
        assert_eq!(cache.lookup("MOD:00719"), Some(&term));
    }
}
