//! Raw evidence carried alongside an aggregated status for audit

use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// One signal's raw evidence
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct EvidenceEntry {
    /// Adapter that produced the evidence
    pub source: Option<String>,
    pub digest: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl EvidenceEntry {
    pub fn new(source: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            source,
            digest: digest(&bytes),
            bytes,
        }
    }
}

/// Summary of all raw evidence for one entity.
///
/// Never consulted when computing a status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Evidence {
    entries: Vec<EvidenceEntry>,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: Option<String>, bytes: Vec<u8>) {
        self.entries.push(EvidenceEntry::new(source, bytes));
    }

    /// Put entries in a canonical order so the summary does not depend on the
    /// order signals arrived in
    pub(crate) fn canonicalize(&mut self) {
        self.entries.sort();
    }

    pub fn entries(&self) -> &[EvidenceEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// All evidence bytes, each entry preceded by a header line naming its
    /// source and digest
    pub fn concat(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in &self.entries {
            let header = format!(
                "--- {} {}\n",
                entry.source.as_deref().unwrap_or("-"),
                entry.digest
            );
            out.extend_from_slice(header.as_bytes());
            out.extend_from_slice(&entry.bytes);
            if !entry.bytes.ends_with(b"\n") {
                out.push(b'\n');
            }
        }
        out
    }

    /// Opaque blob sent with a published status: a single entry's raw bytes,
    /// or the labelled concatenation when several sources contributed
    pub fn blob(&self) -> Vec<u8> {
        match self.entries.as_slice() {
            [only] => only.bytes.clone(),
            _ => self.concat(),
        }
    }

    /// Digest over every entry's digest, or `None` without evidence
    pub fn digest(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        let mut digests: Vec<&str> = self.entries.iter().map(|e| e.digest.as_str()).collect();
        digests.sort_unstable();
        let mut hasher = DefaultHasher::new();
        digests.hash(&mut hasher);
        Some(format!("{:016x}", hasher.finish()))
    }
}

fn digest(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_ignores_entry_order() {
        let mut a = Evidence::new();
        a.push(Some("x".into()), b"page one".to_vec());
        a.push(Some("y".into()), b"page two".to_vec());

        let mut b = Evidence::new();
        b.push(Some("y".into()), b"page two".to_vec());
        b.push(Some("x".into()), b"page one".to_vec());

        assert_eq!(a.digest(), b.digest());
        a.canonicalize();
        b.canonicalize();
        assert_eq!(a, b);
    }

    #[test]
    fn concat_labels_each_entry() {
        let mut evidence = Evidence::new();
        evidence.push(Some("clinic-feed".into()), b"no slots".to_vec());
        let text = String::from_utf8(evidence.concat()).unwrap();
        assert!(text.starts_with("--- clinic-feed "));
        assert!(text.ends_with("no slots\n"));
    }

    #[test]
    fn blob_is_raw_for_a_single_source() {
        let mut evidence = Evidence::new();
        evidence.push(Some("feed".into()), b"<html>3 slots</html>".to_vec());
        assert_eq!(evidence.blob(), b"<html>3 slots</html>".to_vec());

        evidence.push(Some("mirror".into()), b"<html>none</html>".to_vec());
        evidence.canonicalize();
        assert_eq!(evidence.blob(), evidence.concat());
    }

    #[test]
    fn empty_evidence_has_no_digest() {
        assert_eq!(Evidence::new().digest(), None);
        assert!(Evidence::new().concat().is_empty());
    }
}
