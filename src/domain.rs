use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LoaderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Accession(String);

impl Accession {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Accession {
    type Err = LoaderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(LoaderError::Validation("accession cannot be blank".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Term {
    pub id: EntityId,
    pub cv_label: String,
    pub accession: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTerm {
    pub cv_label: String,
    pub accession: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CvParam {
    pub cv_label: String,
    pub accession: String,
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl CvParam {
    pub fn new(cv_label: &str, accession: &str, name: &str) -> Self {
        Self {
            cv_label: cv_label.to_string(),
            accession: accession.to_string(),
            name: name.to_string(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserParam {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Param {
    Cv(CvParam),
    User(UserParam),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Sample,
    Ptm,
    QuantificationMethod,
    Instrument,
    InstrumentComponent,
    ExperimentType,
    Software,
    Additional,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub kind: AnnotationKind,
    pub term: Term,
    #[serde(default)]
    pub value: Option<String>,
}

impl Annotation {
    pub fn new(kind: AnnotationKind, term: Term, value: Option<String>) -> Self {
        Self { kind, term, value }
    }

    pub fn accession(&self) -> &str {
        &self.term.accession
    }
}

// First annotation seen for an accession wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Annotation>", into = "Vec<Annotation>")]
pub struct TermSet {
    entries: BTreeMap<String, Annotation>,
}

impl TermSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, annotation: Annotation) -> Self {
        self.entries
            .entry(annotation.term.accession.clone())
            .or_insert(annotation);
        self
    }

    pub fn union(&self, other: &TermSet) -> TermSet {
        other
            .entries
            .values()
            .cloned()
            .fold(self.clone(), TermSet::with)
    }

    pub fn contains(&self, accession: &str) -> bool {
        self.entries.contains_key(accession)
    }

    pub fn get(&self, accession: &str) -> Option<&Annotation> {
        self.entries.get(accession)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.entries.values()
    }

    pub fn accessions(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.entries.values().map(|annotation| &annotation.term)
    }
}

impl FromIterator<Annotation> for TermSet {
    fn from_iter<I: IntoIterator<Item = Annotation>>(iter: I) -> Self {
        iter.into_iter().fold(TermSet::new(), TermSet::with)
    }
}

impl From<Vec<Annotation>> for TermSet {
    fn from(value: Vec<Annotation>) -> Self {
        value.into_iter().collect()
    }
}

impl From<TermSet> for Vec<Annotation> {
    fn from(value: TermSet) -> Self {
        value.entries.into_values().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubmissionType {
    Complete,
    Partial,
    #[serde(alias = "PRIDE-LEGACY")]
    Pride,
}

impl SubmissionType {
    pub fn requires_assays(&self) -> bool {
        matches!(self, SubmissionType::Complete | SubmissionType::Pride)
    }
}

impl fmt::Display for SubmissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionType::Complete => write!(f, "COMPLETE"),
            SubmissionType::Partial => write!(f, "PARTIAL"),
            SubmissionType::Pride => write!(f, "PRIDE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileRole {
    Result,
    Peak,
    Raw,
    Search,
    Quant,
    Gel,
    Other,
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileRole::Result => "RESULT",
            FileRole::Peak => "PEAK",
            FileRole::Raw => "RAW",
            FileRole::Search => "SEARCH",
            FileRole::Quant => "QUANT",
            FileRole::Gel => "GEL",
            FileRole::Other => "OTHER",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Zip,
}

impl Compression {
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".gz") {
            Some(Compression::Gzip)
        } else if lower.ends_with(".zip") {
            Some(Compression::Zip)
        } else {
            None
        }
    }
}

pub fn decompressed_name(name: &str) -> &str {
    match Compression::from_name(name) {
        Some(Compression::Gzip) => &name[..name.len() - 3],
        Some(Compression::Zip) => &name[..name.len() - 4],
        None => name,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MassSpecFormat {
    PrideXml,
    MzIdentMl,
    MzMl,
    Mgf,
    MzTab,
    Unknown,
}

impl MassSpecFormat {
    pub fn from_file_name(name: &str) -> Self {
        let real = decompressed_name(name);
        let ext = real
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "xml" => MassSpecFormat::PrideXml,
            "mzid" | "mzidentml" => MassSpecFormat::MzIdentMl,
            "mzml" => MassSpecFormat::MzMl,
            "mgf" => MassSpecFormat::Mgf,
            "mztab" => MassSpecFormat::MzTab,
            _ => MassSpecFormat::Unknown,
        }
    }

    pub fn externalizes_spectra(&self) -> bool {
        matches!(self, MassSpecFormat::MzIdentMl)
    }

    pub fn carries_chromatograms(&self) -> bool {
        matches!(self, MassSpecFormat::MzMl)
    }

    pub fn is_result_format(&self) -> bool {
        matches!(self, MassSpecFormat::PrideXml | MassSpecFormat::MzIdentMl)
    }
}

impl fmt::Display for MassSpecFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MassSpecFormat::PrideXml => "PRIDE XML",
            MassSpecFormat::MzIdentMl => "mzIdentML",
            MassSpecFormat::MzMl => "mzML",
            MassSpecFormat::Mgf => "MGF",
            MassSpecFormat::MzTab => "mzTab",
            MassSpecFormat::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn annotation(accession: &str, value: Option<&str>) -> Annotation {
        Annotation::new(
            AnnotationKind::Sample,
            Term {
                id: EntityId::new(1),
                cv_label: "NEWT".to_string(),
                accession: accession.to_string(),
                name: accession.to_string(),
            },
            value.map(str::to_string),
        )
    }

    #[test]
    fn accession_rejects_blank() {
        let err = "   ".parse::<Accession>().unwrap_err();
        assert_matches!(err, LoaderError::Validation(_));
        assert_eq!("PXD000001".parse::<Accession>().unwrap().as_str(), "PXD000001");
    }

    #[test]
    fn term_set_keeps_first_value() {
        let set = TermSet::new()
            .with(annotation("9606", Some("human")))
            .with(annotation("9606", Some("other")));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("9606").unwrap().value.as_deref(), Some("human"));
    }

    #[test]
    fn term_set_union_does_not_alias() {
        let left = TermSet::new().with(annotation("9606", None));
        let right = TermSet::new().with(annotation("10090", None));
        let merged = left.union(&right);
        assert_eq!(merged.accessions(), vec!["10090", "9606"]);
        assert_eq!(left.len(), 1);
        assert_eq!(right.len(), 1);
    }

    #[test]
    fn format_from_compressed_names() {
        assert_eq!(MassSpecFormat::from_file_name("F001261.mzid.gz"), MassSpecFormat::MzIdentMl);
        assert_eq!(MassSpecFormat::from_file_name("run.mzML"), MassSpecFormat::MzMl);
        assert_eq!(MassSpecFormat::from_file_name("pride.xml.zip"), MassSpecFormat::PrideXml);
        assert_eq!(MassSpecFormat::from_file_name("notes"), MassSpecFormat::Unknown);
        assert_eq!(decompressed_name("peaks.MGF.GZ"), "peaks.MGF");
    }

    #[test]
    fn submission_type_branching() {
        assert!(SubmissionType::Complete.requires_assays());
        assert!(SubmissionType::Pride.requires_assays());
        assert!(!SubmissionType::Partial.requires_assays());
    }
}
