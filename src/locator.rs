use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};

use crate::domain::{Compression, decompressed_name};
use crate::error::LoaderError;
use crate::fs_util::{gunzip_atomic, unzip_single_atomic};

pub trait FileLocator: Send + Sync {
    fn resolve(&self, reference: &Utf8Path) -> Result<Utf8PathBuf, LoaderError>;

    fn file_size(&self, path: &Utf8Path) -> Result<u64, LoaderError> {
        fs::metadata(path.as_std_path())
            .map(|meta| meta.len())
            .map_err(|err| LoaderError::Filesystem(format!("stat {path}: {err}")))
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryLocator {
    root: Utf8PathBuf,
}

impl DirectoryLocator {
    pub fn new(root: Utf8PathBuf) -> Result<Self, LoaderError> {
        if !root.as_std_path().is_dir() {
            return Err(LoaderError::Filesystem(format!(
                "submission root {root} is not a directory"
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn search_dirs(&self) -> Result<Vec<Utf8PathBuf>, LoaderError> {
        let mut dirs = vec![self.root.clone()];
        let entries = fs::read_dir(self.root.as_std_path())
            .map_err(|err| LoaderError::Filesystem(err.to_string()))?;
        let mut nested = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| LoaderError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if path.is_dir()
                && let Ok(path) = Utf8PathBuf::from_path_buf(path)
            {
                nested.push(path);
            }
        }
        nested.sort();
        dirs.extend(nested);
        Ok(dirs)
    }

    fn find_in(dir: &Utf8Path, real: &str) -> Result<Option<Utf8PathBuf>, LoaderError> {
        let plain = dir.join(real);
        if plain.as_std_path().is_file() {
            return Ok(Some(plain));
        }
        for (suffix, compression) in [(".gz", Compression::Gzip), (".zip", Compression::Zip)] {
            let packed = dir.join(format!("{real}{suffix}"));
            if !packed.as_std_path().is_file() {
                continue;
            }
            info!(source = %packed, target = %plain, "decompressing submitted file");
            match compression {
                Compression::Gzip => gunzip_atomic(&packed, &plain)?,
                Compression::Zip => unzip_single_atomic(&packed, &plain)?,
            }
            return Ok(Some(plain));
        }
        Ok(None)
    }
}

impl FileLocator for DirectoryLocator {
    fn resolve(&self, reference: &Utf8Path) -> Result<Utf8PathBuf, LoaderError> {
        let name = reference
            .file_name()
            .ok_or_else(|| LoaderError::FileNotFound(reference.to_string()))?;
        let real = decompressed_name(name);
        for dir in self.search_dirs()? {
            if let Some(found) = Self::find_in(&dir, real)? {
                debug!(reference = %reference, resolved = %found, "resolved file");
                return Ok(found);
            }
        }
        Err(LoaderError::FileNotFound(reference.to_string()))
    }
}
