//! Declared field types and the typed values stored in rows and entries.
//!
//! Values carry a total order so that row keys built from them can be
//! sorted and merged: `Missing` sorts first, floats compare with
//! [`f64::total_cmp`], and loci follow karyotype order (`chr1` .. `chr22`,
//! `chrX`, `chrY`, `chrM`, then any other contig by name).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Declared type of a row-key, row or entry field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "element", rename_all = "snake_case")]
pub enum FieldType {
    Bool,
    Int32,
    Int64,
    Float64,
    Str,
    Locus,
    Call,
    Array(Box<FieldType>),
    Set(Box<FieldType>),
}

impl FieldType {
    pub fn array(element: FieldType) -> Self {
        Self::Array(Box::new(element))
    }

    pub fn set(element: FieldType) -> Self {
        Self::Set(Box::new(element))
    }

    /// Returns true for types with a native scalar column representation.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Bool | Self::Int32 | Self::Int64 | Self::Float64 | Self::Str
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Int32 => f.write_str("int32"),
            Self::Int64 => f.write_str("int64"),
            Self::Float64 => f.write_str("float64"),
            Self::Str => f.write_str("str"),
            Self::Locus => f.write_str("locus"),
            Self::Call => f.write_str("call"),
            Self::Array(element) => write!(f, "array<{element}>"),
            Self::Set(element) => write!(f, "set<{element}>"),
        }
    }
}

/// A genomic position: contig name plus 1-based position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locus {
    pub contig: String,
    pub position: u32,
}

impl Locus {
    pub fn new(contig: impl Into<String>, position: u32) -> Self {
        Self {
            contig: contig.into(),
            position,
        }
    }
}

/// Sort key placing numbered autosomes first, then X, Y, M, then others.
fn contig_rank(contig: &str) -> (u8, u32) {
    let bare = contig.strip_prefix("chr").unwrap_or(contig);
    if let Ok(number) = bare.parse::<u32>() {
        return (0, number);
    }
    match bare {
        "X" => (1, 0),
        "Y" => (1, 1),
        "M" | "MT" => (1, 2),
        _ => (2, 0),
    }
}

impl Ord for Locus {
    fn cmp(&self, other: &Self) -> Ordering {
        contig_rank(&self.contig)
            .cmp(&contig_rank(&other.contig))
            .then_with(|| self.contig.cmp(&other.contig))
            .then_with(|| self.position.cmp(&other.position))
    }
}

impl PartialOrd for Locus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.contig, self.position)
    }
}

impl FromStr for Locus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let parse_error = || ModelError::Parse {
            field_type: FieldType::Locus.to_string(),
            text: s.to_string(),
        };
        let (contig, position) = s.trim().rsplit_once(':').ok_or_else(parse_error)?;
        if contig.is_empty() {
            return Err(parse_error());
        }
        let position = position.parse::<u32>().map_err(|_| parse_error())?;
        Ok(Self::new(contig, position))
    }
}

/// A genotype call: allele indices and whether the call is phased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Call {
    pub alleles: Vec<u16>,
    pub phased: bool,
}

impl Call {
    pub fn unphased(alleles: impl Into<Vec<u16>>) -> Self {
        Self {
            alleles: alleles.into(),
            phased: false,
        }
    }

    pub fn phased(alleles: impl Into<Vec<u16>>) -> Self {
        Self {
            alleles: alleles.into(),
            phased: true,
        }
    }

    pub fn ploidy(&self) -> usize {
        self.alleles.len()
    }

    /// Number of non-reference alleles in the call.
    pub fn n_alt_alleles(&self) -> usize {
        self.alleles.iter().filter(|allele| **allele > 0).count()
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = if self.phased { "|" } else { "/" };
        for (pos, allele) in self.alleles.iter().enumerate() {
            if pos > 0 {
                f.write_str(separator)?;
            }
            write!(f, "{allele}")?;
        }
        Ok(())
    }
}

impl FromStr for Call {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        let parse_error = || ModelError::Parse {
            field_type: FieldType::Call.to_string(),
            text: s.to_string(),
        };
        if text.is_empty() {
            return Err(parse_error());
        }
        let phased = text.contains('|');
        if phased && text.contains('/') {
            return Err(parse_error());
        }
        let separator = if phased { '|' } else { '/' };
        let alleles = text
            .split(separator)
            .map(|part| part.parse::<u16>().map_err(|_| parse_error()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { alleles, phased })
    }
}

/// A typed value held by a row key, row field or entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Value {
    Missing,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Str(String),
    Locus(Locus),
    Call(Call),
    Array(Vec<Value>),
    /// Elements are kept sorted and distinct.
    Set(Vec<Value>),
}

impl Value {
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    pub fn locus(contig: impl Into<String>, position: u32) -> Self {
        Self::Locus(Locus::new(contig, position))
    }

    pub fn call(alleles: &[u16]) -> Self {
        Self::Call(Call::unphased(alleles))
    }

    pub fn array(values: impl IntoIterator<Item = Value>) -> Self {
        Self::Array(values.into_iter().collect())
    }

    pub fn set(values: impl IntoIterator<Item = Value>) -> Self {
        let mut items: Vec<Value> = values.into_iter().collect();
        items.sort();
        items.dedup();
        Self::Set(items)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Returns true if this value may be stored in a field of `field_type`.
    ///
    /// `Missing` conforms to every type.
    pub fn conforms_to(&self, field_type: &FieldType) -> bool {
        match (self, field_type) {
            (Self::Missing, _) => true,
            (Self::Bool(_), FieldType::Bool)
            | (Self::Int32(_), FieldType::Int32)
            | (Self::Int64(_), FieldType::Int64)
            | (Self::Float64(_), FieldType::Float64)
            | (Self::Str(_), FieldType::Str)
            | (Self::Locus(_), FieldType::Locus)
            | (Self::Call(_), FieldType::Call) => true,
            (Self::Array(items), FieldType::Array(element))
            | (Self::Set(items), FieldType::Set(element)) => {
                items.iter().all(|item| item.conforms_to(element))
            }
            _ => false,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Missing => 0,
            Self::Bool(_) => 1,
            Self::Int32(_) => 2,
            Self::Int64(_) => 3,
            Self::Float64(_) => 4,
            Self::Str(_) => 5,
            Self::Locus(_) => 6,
            Self::Call(_) => 7,
            Self::Array(_) => 8,
            Self::Set(_) => 9,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Missing, Self::Missing) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int32(a), Self::Int32(b)) => a.cmp(b),
            (Self::Int64(a), Self::Int64(b)) => a.cmp(b),
            (Self::Float64(a), Self::Float64(b)) => a.total_cmp(b),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            (Self::Locus(a), Self::Locus(b)) => a.cmp(b),
            (Self::Call(a), Self::Call(b)) => a.cmp(b),
            (Self::Array(a), Self::Array(b)) | (Self::Set(a), Self::Set(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("NA"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int32(value) => write!(f, "{value}"),
            Self::Int64(value) => write!(f, "{value}"),
            Self::Float64(value) => write!(f, "{value}"),
            Self::Str(value) => f.write_str(value),
            Self::Locus(value) => write!(f, "{value}"),
            Self::Call(value) => write!(f, "{value}"),
            Self::Array(items) | Self::Set(items) => {
                let (open, close) = if matches!(self, Self::Set(_)) {
                    ('{', '}')
                } else {
                    ('[', ']')
                };
                write!(f, "{open}")?;
                for (pos, item) in items.iter().enumerate() {
                    if pos > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "{close}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Locus> for Value {
    fn from(value: Locus) -> Self {
        Self::Locus(value)
    }
}

impl From<Call> for Value {
    fn from(value: Call) -> Self {
        Self::Call(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Missing, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contigs_follow_karyotype_order() {
        let mut loci = vec![
            Locus::new("chrX", 5),
            Locus::new("chr10", 1),
            Locus::new("chr2", 300),
            Locus::new("chrUn_gl000220", 1),
            Locus::new("chr2", 20),
            Locus::new("chrM", 1),
        ];
        loci.sort();
        let rendered: Vec<String> = loci.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "chr2:20",
                "chr2:300",
                "chr10:1",
                "chrX:5",
                "chrM:1",
                "chrUn_gl000220:1"
            ]
        );
    }

    #[test]
    fn calls_parse_phased_and_unphased() {
        assert_eq!("0/1".parse::<Call>().unwrap(), Call::unphased([0, 1]));
        assert_eq!("1|0".parse::<Call>().unwrap(), Call::phased([1, 0]));
        assert_eq!("1".parse::<Call>().unwrap().ploidy(), 1);
        assert!("0/1|1".parse::<Call>().is_err());
        assert!("./.".parse::<Call>().is_err());
    }

    #[test]
    fn missing_sorts_first_and_conforms_everywhere() {
        assert!(Value::Missing < Value::Int64(i64::MIN));
        assert!(Value::Missing.conforms_to(&FieldType::array(FieldType::Call)));
        assert!(!Value::Int32(1).conforms_to(&FieldType::Int64));
    }

    #[test]
    fn sets_are_sorted_and_distinct() {
        let value = Value::set(["b".into(), "a".into(), "b".into()]);
        assert_eq!(value.to_string(), "{a,b}");
    }
}
