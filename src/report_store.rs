use crate::error::ReadError;
use flate2::read::MultiGzDecoder;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// How a report file is stored on disk. Chosen once from the file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    PlainText,
    GzipCompressed,
}

impl ReportKind {
    /// Only a `.gz` suffix means compressed; everything else is read as text.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("gz") => ReportKind::GzipCompressed,
            _ => ReportKind::PlainText,
        }
    }
}

/// `.xml` and `.gz` (any case) are the suffixes picked up from the inbox.
pub fn has_report_suffix(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml") || ext.eq_ignore_ascii_case("gz"))
}

/// Where a candidate was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverySource {
    Backlog,
    Watch,
    Explicit,
}

/// A report file waiting to go through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub kind: ReportKind,
    pub source: DiscoverySource,
}

impl Candidate {
    pub fn new(path: PathBuf, source: DiscoverySource) -> Self {
        let kind = ReportKind::from_path(&path);
        Candidate { path, kind, source }
    }

    /// Builds a candidate only if `path` is a direct child of `watched_dir`
    /// with a recognized suffix. Anything under the archive subdirectory is a
    /// grandchild and therefore never eligible.
    pub fn in_watched_dir(
        path: &Path,
        watched_dir: &Path,
        source: DiscoverySource,
    ) -> Option<Self> {
        if path.parent() != Some(watched_dir) || !has_report_suffix(path) {
            return None;
        }
        Some(Candidate::new(path.to_path_buf(), source))
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Read a candidate's bytes, decompressing `.gz`, and make sure the result is
/// well-formed XML. No DMARC schema is enforced.
pub fn read_report(candidate: &Candidate) -> Result<String, ReadError> {
    let path = &candidate.path;
    tracing::info!(file = %candidate.file_name(), "Reading file");

    let raw = fs::read(path).map_err(|source| ReadError::NotReadable {
        path: path.clone(),
        source,
    })?;

    let bytes = match candidate.kind {
        ReportKind::PlainText => raw,
        ReportKind::GzipCompressed => {
            let mut decoded = Vec::new();
            MultiGzDecoder::new(raw.as_slice())
                .read_to_end(&mut decoded)
                .map_err(|source| ReadError::NotValidCompression {
                    path: path.clone(),
                    source,
                })?;
            decoded
        }
    };

    let text = String::from_utf8(bytes).map_err(|source| ReadError::NotValidText {
        path: path.clone(),
        source,
    })?;

    check_well_formed(&text).map_err(|reason| ReadError::NotWellFormedMarkup {
        path: path.clone(),
        reason,
    })?;

    Ok(text)
}

/// Generic well-formedness check: exactly one root element, balanced and
/// matching tags, parseable attributes, nothing but whitespace, comments or
/// processing instructions outside the root.
pub fn check_well_formed(text: &str) -> Result<(), String> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut roots = 0usize;

    loop {
        let position = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if depth == 0 {
                    roots += 1;
                    if roots > 1 {
                        return Err(format!("junk after document element at byte {position}"));
                    }
                }
                check_element(&e, position)?;
                depth += 1;
            }
            Ok(Event::Empty(e)) => {
                if depth == 0 {
                    roots += 1;
                    if roots > 1 {
                        return Err(format!("junk after document element at byte {position}"));
                    }
                }
                check_element(&e, position)?;
            }
            Ok(Event::End(_)) => {
                if depth == 0 {
                    return Err(format!("unexpected closing tag at byte {position}"));
                }
                depth -= 1;
            }
            Ok(Event::Text(t)) => {
                if depth == 0 && !t.iter().all(u8::is_ascii_whitespace) {
                    return Err(format!("text outside the document element at byte {position}"));
                }
                t.unescape()
                    .map_err(|err| format!("bad character data at byte {position}: {err}"))?;
            }
            Ok(Event::CData(_)) => {
                if depth == 0 {
                    return Err(format!("CDATA outside the document element at byte {position}"));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(format!("{err} (near byte {})", reader.error_position())),
        }
    }

    if roots == 0 {
        return Err("no element found".to_string());
    }
    if depth != 0 {
        return Err(format!("{depth} unclosed element(s) at end of document"));
    }
    Ok(())
}

/// Name and attribute checks for a start or empty tag: legal XML names, no
/// duplicate attributes, attribute values free of bare `&` and unknown
/// entities.
fn check_element(tag: &BytesStart<'_>, position: impl fmt::Display) -> Result<(), String> {
    let name = tag.name();
    if !is_xml_name(name.as_ref()) {
        return Err(format!(
            "invalid element name {:?} at byte {position}",
            String::from_utf8_lossy(name.as_ref())
        ));
    }
    for attr in tag.attributes() {
        let attr = attr.map_err(|err| format!("bad attribute at byte {position}: {err}"))?;
        if !is_xml_name(attr.key.as_ref()) {
            return Err(format!(
                "invalid attribute name {:?} at byte {position}",
                String::from_utf8_lossy(attr.key.as_ref())
            ));
        }
        attr.unescape_value()
            .map_err(|err| format!("bad attribute value at byte {position}: {err}"))?;
    }
    Ok(())
}

// XML 1.0 Name production, with every non-ASCII char treated as a name char.
fn is_xml_name(name: &[u8]) -> bool {
    let Ok(name) = std::str::from_utf8(name) else {
        return false;
    };
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let start_char = |c: char| c.is_ascii_alphabetic() || c == '_' || c == ':' || !c.is_ascii();
    start_char(first)
        && chars.all(|c| start_char(c) || c.is_ascii_digit() || c == '-' || c == '.')
}
