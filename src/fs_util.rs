use std::fs;
use std::io;

use camino::Utf8Path;
use flate2::read::GzDecoder;
use tempfile::Builder;
use zip::ZipArchive;

use crate::error::LoaderError;

pub fn gunzip_atomic(source: &Utf8Path, target: &Utf8Path) -> Result<(), LoaderError> {
    let file = fs::File::open(source.as_std_path())
        .map_err(|err| LoaderError::Filesystem(format!("open gzip {source}: {err}")))?;
    let mut decoder = GzDecoder::new(io::BufReader::new(file));
    write_atomic(target, |out| io::copy(&mut decoder, out).map(|_| ()))
}

pub fn unzip_single_atomic(source: &Utf8Path, target: &Utf8Path) -> Result<(), LoaderError> {
    let file = fs::File::open(source.as_std_path())
        .map_err(|err| LoaderError::Filesystem(format!("open zip {source}: {err}")))?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| LoaderError::Filesystem(err.to_string()))?;

    let mut selected = None;
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|err| LoaderError::Filesystem(err.to_string()))?;
        if entry.enclosed_name().is_none() {
            return Err(LoaderError::Filesystem(
                "zip entry path traversal detected".to_string(),
            ));
        }
        if entry.is_dir() {
            continue;
        }
        if selected.is_some() {
            return Err(LoaderError::Filesystem(format!(
                "zip {source} holds more than one file"
            )));
        }
        selected = Some(i);
    }
    let index = selected
        .ok_or_else(|| LoaderError::Filesystem(format!("zip {source} holds no file")))?;
    let mut entry = archive
        .by_index(index)
        .map_err(|err| LoaderError::Filesystem(err.to_string()))?;
    write_atomic(target, |out| io::copy(&mut entry, out).map(|_| ()))
}

fn write_atomic<F>(target: &Utf8Path, fill: F) -> Result<(), LoaderError>
where
    F: FnOnce(&mut fs::File) -> io::Result<()>,
{
    let parent = target
        .parent()
        .ok_or_else(|| LoaderError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| LoaderError::Filesystem(err.to_string()))?;
    let mut temp = Builder::new()
        .prefix("prider-decompress")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| LoaderError::Filesystem(err.to_string()))?;
    fill(temp.as_file_mut()).map_err(|err| LoaderError::Filesystem(err.to_string()))?;
    temp.persist(target.as_std_path())
        .map_err(|err| LoaderError::Filesystem(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use camino::Utf8PathBuf;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    #[test]
    fn gunzip_writes_target() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let source = root.join("peaks.mgf.gz");

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"BEGIN IONS\nEND IONS\n").unwrap();
        fs::write(source.as_std_path(), encoder.finish().unwrap()).unwrap();

        let target = root.join("peaks.mgf");
        gunzip_atomic(&source, &target).unwrap();
        assert_eq!(
            fs::read_to_string(target.as_std_path()).unwrap(),
            "BEGIN IONS\nEND IONS\n"
        );
    }

    #[test]
    fn unzip_rejects_multiple_entries() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let source = root.join("bundle.zip");

        let file = fs::File::create(source.as_std_path()).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("a.mgf", options).unwrap();
        writer.write_all(b"a").unwrap();
        writer.start_file("b.mgf", options).unwrap();
        writer.write_all(b"b").unwrap();
        writer.finish().unwrap();

        let err = unzip_single_atomic(&source, &root.join("bundle")).unwrap_err();
        assert!(matches!(err, LoaderError::Filesystem(_)));
    }
}
