//! Large-object resolver.
//!
//! Long text columns (statement text, mostly) are exported out of band: the
//! snapshot cell holds a reference `<stem>.<offset>.<length>.` into a blob
//! file stored under a `lob/` directory next to the snapshot files.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ReportError, Result};
use crate::loader::decode_permissive;

/// Width resolved text is padded to.
pub const DEFAULT_TEXT_WIDTH: usize = 79;

/// Where blob bytes come from.
pub trait BlobSource {
    /// Full contents of blob `stem`, or `None` if no such blob exists.
    fn read(&mut self, stem: &str) -> Result<Option<Vec<u8>>>;
}

/// Blobs stored as `<base>/<subdir>/lob/<stem>`; the first match in sorted
/// subdirectory order wins.
#[derive(Debug, Clone)]
pub struct DirBlobSource {
    base: PathBuf,
}

impl DirBlobSource {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn locate(&self, stem: &str) -> Result<Option<PathBuf>> {
        let entries = match fs::read_dir(&self.base) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ReportError::file(&self.base, e)),
        };
        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs
            .into_iter()
            .map(|d| d.join("lob").join(stem))
            .find(|p| p.is_file()))
    }
}

impl BlobSource for DirBlobSource {
    fn read(&mut self, stem: &str) -> Result<Option<Vec<u8>>> {
        let Some(path) = self.locate(stem)? else {
            return Ok(None);
        };
        log::debug!("reading blob {}", path.display());
        fs::read(&path)
            .map(Some)
            .map_err(|e| ReportError::file(&path, e))
    }
}

/// A parsed `<stem>.<offset>.<length>.` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobRef<'a> {
    pub stem: &'a str,
    pub offset: usize,
    pub length: usize,
}

impl<'a> LobRef<'a> {
    /// Parse a reference; `None` when it is malformed.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let body = raw.trim().strip_suffix('.')?;
        let (rest, length) = body.rsplit_once('.')?;
        let (stem, offset) = rest.rsplit_once('.')?;
        Some(Self {
            stem,
            offset: offset.parse().ok()?,
            length: length.parse().ok()?,
        })
    }
}

/// Resolves references to display text, caching every outcome by reference.
pub struct LobResolver<S: BlobSource> {
    source: S,
    width: usize,
    cache: HashMap<String, String>,
}

impl LobResolver<DirBlobSource> {
    /// Resolver over the blob directories of a collection at `base`.
    pub fn for_dir(base: &Path) -> Self {
        Self::new(DirBlobSource::new(base), DEFAULT_TEXT_WIDTH)
    }
}

impl<S: BlobSource> LobResolver<S> {
    pub fn new(source: S, width: usize) -> Self {
        Self {
            source,
            width,
            cache: HashMap::new(),
        }
    }

    /// Text referenced by `reference`, right-padded to the resolver width.
    ///
    /// Malformed references and missing blobs resolve to an inline
    /// diagnostic instead of an error. Read failures on an existing blob
    /// are returned as errors.
    pub fn resolve(&mut self, reference: &str) -> Result<String> {
        if let Some(hit) = self.cache.get(reference) {
            log::debug!("lob cache hit: {reference}");
            return Ok(hit.clone());
        }

        let text = match LobRef::parse(reference) {
            None => format!("LOB_ID: {reference} INCORRECT FORMAT"),
            Some(r) => match self.source.read(r.stem)? {
                None => format!("LOB_FILE: {} NOT FOUND", r.stem),
                Some(bytes) => {
                    let start = r.offset.min(bytes.len());
                    let end = r.offset.saturating_add(r.length).min(bytes.len());
                    let text = decode_permissive(&bytes[start..end]);
                    format!("{text:<width$}", width = self.width)
                }
            },
        };

        self.cache.insert(reference.to_string(), text.clone());
        Ok(text)
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// In-memory blob store counting reads.
    struct CountingSource {
        blobs: HashMap<String, Vec<u8>>,
        reads: Rc<Cell<usize>>,
    }

    impl BlobSource for CountingSource {
        fn read(&mut self, stem: &str) -> Result<Option<Vec<u8>>> {
            self.reads.set(self.reads.get() + 1);
            Ok(self.blobs.get(stem).cloned())
        }
    }

    fn counting(width: usize) -> (LobResolver<CountingSource>, Rc<Cell<usize>>) {
        let reads = Rc::new(Cell::new(0));
        let mut blobs = HashMap::new();
        blobs.insert("stem".to_string(), b"AB\x00CD".to_vec());
        blobs.insert("db.lob.001".to_string(), b"select 1".to_vec());
        let resolver = LobResolver::new(
            CountingSource {
                blobs,
                reads: reads.clone(),
            },
            width,
        );
        (resolver, reads)
    }

    // -----------------------------------------------------------------------
    // Reference grammar
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_reference() {
        assert_eq!(
            LobRef::parse("db.lob.001.0.8."),
            Some(LobRef {
                stem: "db.lob.001",
                offset: 0,
                length: 8
            })
        );
        assert_eq!(LobRef::parse("stem.1.3"), None);
        assert_eq!(LobRef::parse("stem.badnum."), None);
        assert_eq!(LobRef::parse("x."), None);
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    #[test]
    fn test_slice_with_nul_replaced() {
        let (mut r, _) = counting(0);
        assert_eq!(r.resolve("stem.1.3.").unwrap(), "B.C");
    }

    #[test]
    fn test_padded_to_width() {
        let (mut r, _) = counting(DEFAULT_TEXT_WIDTH);
        let text = r.resolve("stem.1.3.").unwrap();
        assert_eq!(text.len(), DEFAULT_TEXT_WIDTH);
        assert!(text.starts_with("B.C "));
    }

    #[test]
    fn test_second_resolution_hits_cache() {
        let (mut r, reads) = counting(DEFAULT_TEXT_WIDTH);
        let first = r.resolve("db.lob.001.0.8.").unwrap();
        let second = r.resolve("db.lob.001.0.8.").unwrap();
        assert_eq!(first, second);
        assert_eq!(reads.get(), 1);
        assert_eq!(r.cached(), 1);
    }

    #[test]
    fn test_malformed_reference_is_inline() {
        let (mut r, reads) = counting(DEFAULT_TEXT_WIDTH);
        assert_eq!(
            r.resolve("stem.badnum.").unwrap(),
            "LOB_ID: stem.badnum. INCORRECT FORMAT"
        );
        assert_eq!(reads.get(), 0);
    }

    #[test]
    fn test_missing_blob_is_inline() {
        let (mut r, reads) = counting(DEFAULT_TEXT_WIDTH);
        assert_eq!(r.resolve("gone.0.4.").unwrap(), "LOB_FILE: gone NOT FOUND");
        r.resolve("gone.0.4.").unwrap();
        assert_eq!(reads.get(), 1);
    }

    #[test]
    fn test_range_clamped_to_blob() {
        let (mut r, _) = counting(0);
        assert_eq!(r.resolve("stem.3.100.").unwrap(), "CD");
        assert_eq!(r.resolve("stem.50.2.").unwrap(), "");
    }

    #[test]
    fn test_dir_source_finds_first_sorted_match() {
        let tmp = tempfile::TempDir::new().unwrap();
        for (dir, body) in [("b_2024030111", "second"), ("a_2024030110", "first")] {
            let lob = tmp.path().join(dir).join("lob");
            fs::create_dir_all(&lob).unwrap();
            fs::write(lob.join("s.lob"), body).unwrap();
        }
        let mut r = LobResolver::new(DirBlobSource::new(tmp.path()), 0);
        assert_eq!(r.resolve("s.lob.0.5.").unwrap(), "first");
        assert_eq!(r.resolve("t.lob.0.5.").unwrap(), "LOB_FILE: t.lob NOT FOUND");
    }
}
