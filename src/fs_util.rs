use std::fs;
use std::io::Read;

use camino::Utf8Path;
use flate2::read::GzDecoder;

use crate::error::MolgenError;

/// Reads a structure file, transparently inflating `.gz` input.
pub fn read_structure_bytes(path: &Utf8Path) -> Result<Vec<u8>, MolgenError> {
    let raw = fs::read(path.as_std_path())
        .map_err(|err| MolgenError::Filesystem(format!("read {path}: {err}")))?;
    if path.extension() != Some("gz") {
        return Ok(raw);
    }

    let mut decoder = GzDecoder::new(raw.as_slice());
    let mut content = Vec::new();
    decoder
        .read_to_end(&mut content)
        .map_err(|err| MolgenError::InvalidStructure(format!("{path}: {err}")))?;
    Ok(content)
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), MolgenError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| MolgenError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("molgen-out")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| MolgenError::Filesystem(err.to_string()))?;
    std::io::Write::write_all(&mut temp, content)
        .map_err(|err| MolgenError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| MolgenError::Filesystem(err.to_string()))?;
    Ok(())
}
