use std::fs;
use std::io::Write;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;

use molgen_client::domain::{StructureFormat, UploadedStructure};
use molgen_client::error::MolgenError;
use molgen_client::viewer::summarize;

const PDB: &str = "\
ATOM      1  N   MET A   1      38.198  19.582  28.222  1.00 40.00           N
ATOM      2  CA  MET A   1      37.190  20.612  28.403  1.00 40.00           C
HETATM    3  O   HOH A 201      30.000  10.000  10.000  1.00 20.00           O
END
";

fn utf8(path: std::path::PathBuf) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path).unwrap()
}

#[test]
fn structure_loaded_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = utf8(dir.path().join("receptor.pdbqt"));
    fs::write(&path, PDB).unwrap();

    let structure = UploadedStructure::from_path(&path).unwrap();
    assert_eq!(structure.name, "receptor.pdbqt");
    assert_eq!(structure.format, StructureFormat::Pdbqt);

    let summary = summarize(&structure);
    assert_eq!(summary.atoms, 2);
    assert_eq!(summary.waters, 1);
    assert_eq!(summary.chains, vec!["A".to_string()]);
}

#[test]
fn gzipped_structure_keeps_inner_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = utf8(dir.path().join("1abc.pdb.gz"));
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(PDB.as_bytes()).unwrap();
    fs::write(&path, encoder.finish().unwrap()).unwrap();

    let structure = UploadedStructure::from_path(&path).unwrap();
    assert_eq!(structure.name, "1abc.pdb");
    assert_eq!(structure.format, StructureFormat::Pdb);
    assert_eq!(structure.content, PDB.as_bytes());
}

#[test]
fn blank_structure_file_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = utf8(dir.path().join("empty.pdb"));
    fs::write(&path, "\n  \n").unwrap();

    assert_matches!(
        UploadedStructure::from_path(&path),
        Err(MolgenError::InvalidStructure(_))
    );
}

#[test]
fn missing_structure_file_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = utf8(dir.path().join("nope.pdb"));
    assert!(UploadedStructure::from_path(&path).is_err());
}
