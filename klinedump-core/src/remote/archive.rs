//! Zip decompression of downloaded archives.
//!
//! Every upstream archive wraps exactly one tabular payload.

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::DumpError;

/// Name and contents of the single file inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub name: String,
    pub bytes: Vec<u8>,
}

pub fn extract_single(bytes: &[u8]) -> Result<Payload, DumpError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| DumpError::Decompress(format!("open archive: {e}")))?;

    let mut file_indices = Vec::new();
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| DumpError::Decompress(format!("read entry {i}: {e}")))?;
        if !entry.is_dir() {
            file_indices.push(i);
        }
    }

    let index = match file_indices.as_slice() {
        [only] => *only,
        [] => return Err(DumpError::Decompress("archive contains no file".into())),
        many => {
            return Err(DumpError::Decompress(format!(
                "expected one file in archive, found {}",
                many.len()
            )))
        }
    };

    let mut entry = archive
        .by_index(index)
        .map_err(|e| DumpError::Decompress(format!("read entry: {e}")))?;
    let name = entry.name().to_string();
    let mut out = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
    entry
        .read_to_end(&mut out)
        .map_err(|e| DumpError::Decompress(format!("inflate {name}: {e}")))?;

    Ok(Payload { name, bytes: out })
}

/// Build an in-memory archive from (name, contents) pairs.
///
/// Used to serve archives from memory; upstream archives always hold one file.
pub fn pack(files: &[(&str, &[u8])]) -> Result<Vec<u8>, DumpError> {
    let zip_err = |e: zip::result::ZipError| DumpError::Decompress(format!("build archive: {e}"));
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in files {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .map_err(zip_err)?;
        writer
            .write_all(contents)
            .map_err(|e| DumpError::Decompress(format!("write {name}: {e}")))?;
    }
    Ok(writer.finish().map_err(zip_err)?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        pack(files).unwrap()
    }

    #[test]
    fn extracts_the_only_file() {
        let bytes = zip_bytes(&[("BTCUSDT-1m-2021-01.csv", b"1,2,3\n")]);
        let payload = extract_single(&bytes).unwrap();
        assert_eq!(payload.name, "BTCUSDT-1m-2021-01.csv");
        assert_eq!(payload.bytes, b"1,2,3\n");
    }

    #[test]
    fn rejects_multi_file_archives() {
        let bytes = zip_bytes(&[("a.csv", b"a"), ("b.csv", b"b")]);
        assert!(matches!(
            extract_single(&bytes),
            Err(DumpError::Decompress(_))
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(extract_single(b"<Error>NoSuchKey</Error>").is_err());
    }
}
