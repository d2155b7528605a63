mod common;

use assert_matches::assert_matches;
use serde_json::json;

use common::{complete_submission, project_json};
use prider_loader::domain::{FileRole, MassSpecFormat, SubmissionType, decompressed_name};
use prider_loader::error::{ErrorKind, LoaderError, SubmissionLoadError};
use prider_loader::submission::SubmissionParser;

#[test]
fn legacy_submission_type_alias() {
    let mut project = project_json("PRIDE-LEGACY");
    project["title"] = json!("legacy");
    let descriptor = json!({ "project": project, "files": [] });
    let submission = SubmissionParser::parse_str(&descriptor.to_string()).unwrap();

    assert_eq!(submission.submission_type(), SubmissionType::Pride);
    assert!(submission.submission_type().requires_assays());
    assert!(!SubmissionType::Partial.requires_assays());
}

#[test]
fn formats_are_inferred_through_compression() {
    assert_eq!(MassSpecFormat::from_file_name("F001261.mzid.gz"), MassSpecFormat::MzIdentMl);
    assert_eq!(MassSpecFormat::from_file_name("run.MZML.zip"), MassSpecFormat::MzMl);
    assert_eq!(MassSpecFormat::from_file_name("PRIDE_Exp_1.xml"), MassSpecFormat::PrideXml);
    assert_eq!(MassSpecFormat::from_file_name("notes"), MassSpecFormat::Unknown);
    assert_eq!(decompressed_name("peaks.mgf.gz"), "peaks.mgf");
    assert_eq!(decompressed_name("peaks.mgf"), "peaks.mgf");
}

#[test]
fn files_are_mapped_to_their_result_file() {
    let submission = complete_submission();
    let result = submission.result_files().next().unwrap();
    let mapped: Vec<_> = submission.mapped_files(result).collect();

    assert_eq!(mapped.len(), 1);
    assert_eq!(mapped[0].role, FileRole::Peak);
    let raw = submission.file(3).unwrap();
    assert!(submission.owning_result_file(raw).is_none());
    assert_eq!(
        submission.owning_result_file(mapped[0]).map(|file| file.id),
        Some(1)
    );
}

#[test]
fn undeclared_mapping_is_rejected() {
    let descriptor = json!({
        "project": project_json("COMPLETE"),
        "files": [{ "id": 1, "role": "RESULT", "path": "a.mzid", "mappings": [9] }]
    });
    assert_matches!(
        SubmissionParser::parse_str(&descriptor.to_string()),
        Err(LoaderError::Validation(_))
    );
    assert_matches!(
        SubmissionParser::parse_str("{ \"project\": 1 }"),
        Err(LoaderError::SubmissionParse(_))
    );
}

#[test]
fn load_error_keeps_its_cause() {
    let err = SubmissionLoadError::new(
        "PXD000001",
        LoaderError::Conflict {
            kind: "assay",
            accession: "1234".to_string(),
        },
    );
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.message, "assay accession already exists: 1234");
    assert_eq!(
        err.to_string(),
        "failed to load project PXD000001: assay accession already exists: 1234"
    );
}
