use std::fs;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::LoaderError;
use crate::mass::DEFAULT_DELTA_MZ_TOLERANCE;
use crate::scanner::ScanSettings;

pub const DEFAULT_CONFIG_FILE: &str = "prider-loader.json";
pub const DEFAULT_PUBMED_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoaderConfig {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub archive_root: Option<Utf8PathBuf>,
    #[serde(default)]
    pub submission_root: Option<Utf8PathBuf>,
    #[serde(default)]
    pub decoded_root: Option<Utf8PathBuf>,
    #[serde(default)]
    pub delta_mz_tolerance: Option<f64>,
    #[serde(default)]
    pub ptm_vocabularies: Option<Vec<String>>,
    #[serde(default)]
    pub resolve_citations: Option<bool>,
    #[serde(default)]
    pub pubmed_base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub archive_root: Utf8PathBuf,
    pub submission_root: Option<Utf8PathBuf>,
    pub decoded_root: Option<Utf8PathBuf>,
    pub scan: ScanSettings,
    pub resolve_citations: bool,
    pub pubmed_base_url: String,
}

impl ResolvedConfig {
    pub fn submission_root_for(&self, descriptor: &Utf8Path) -> Utf8PathBuf {
        match &self.submission_root {
            Some(root) => root.clone(),
            None => descriptor
                .parent()
                .filter(|parent| !parent.as_str().is_empty())
                .map(Utf8Path::to_path_buf)
                .unwrap_or_else(|| Utf8PathBuf::from(".")),
        }
    }

    pub fn decoded_root_for(&self, descriptor: &Utf8Path) -> Utf8PathBuf {
        self.decoded_root
            .clone()
            .unwrap_or_else(|| self.submission_root_for(descriptor))
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, LoaderError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(LoaderConfig::default());
        }

        let config = Self::read(&config_path)?;
        Self::resolve_config(config)
    }

    fn read(path: &Path) -> Result<LoaderConfig, LoaderError> {
        let content =
            fs::read_to_string(path).map_err(|_| LoaderError::ConfigRead(path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| LoaderError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(config: LoaderConfig) -> Result<ResolvedConfig, LoaderError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let delta_mz_tolerance = config
            .delta_mz_tolerance
            .unwrap_or(DEFAULT_DELTA_MZ_TOLERANCE);
        if !delta_mz_tolerance.is_finite() || delta_mz_tolerance <= 0.0 {
            return Err(LoaderError::ConfigParse(format!(
                "delta_mz_tolerance must be a positive number, got {delta_mz_tolerance}"
            )));
        }

        let ptm_vocabularies = config
            .ptm_vocabularies
            .unwrap_or_else(default_ptm_vocabularies)
            .into_iter()
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty())
            .collect::<Vec<_>>();

        let archive_root = match config.archive_root {
            Some(root) => root,
            None => default_archive_root()?,
        };

        Ok(ResolvedConfig {
            schema_version,
            archive_root,
            submission_root: config.submission_root,
            decoded_root: config.decoded_root,
            scan: ScanSettings {
                delta_mz_tolerance,
                ptm_vocabularies,
            },
            resolve_citations: config.resolve_citations.unwrap_or(false),
            pubmed_base_url: config
                .pubmed_base_url
                .unwrap_or_else(|| DEFAULT_PUBMED_BASE_URL.to_string()),
        })
    }
}

pub fn default_ptm_vocabularies() -> Vec<String> {
    vec!["MOD".to_string(), "UNIMOD".to_string()]
}

fn default_archive_root() -> Result<Utf8PathBuf, LoaderError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(
                dirs.home_dir()
                    .join(".cache")
                    .join("prider-loader")
                    .join("archive"),
            )
            .ok()
        })
        .ok_or_else(|| LoaderError::Filesystem("unable to resolve archive directory".to_string()))
}
