//! Resource resolution
//!
//! Models reference side files by relative URI (`textures/wood.png`,
//! `./scene.bin`). The selection carries no directory structure, so a
//! reference resolves when its basename exactly matches a co-selected file.
//! Inline `data:` URIs, `blob:` handles, network URLs and absolute paths pass
//! through untouched.
//!
//! A reference that cannot be resolved is critical when it names geometry
//! (`bin`, `gltf`, `glb`) and aborts the load; anything else becomes a
//! [`ResourceWarning`] and the model loads without it.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::FileSelection;
use crate::error::{Error, Result};

/// Extensions whose absence makes a model unloadable.
pub const CRITICAL_EXTENSIONS: [&str; 3] = ["bin", "gltf", "glb"];

/// What [`ResourceResolver::resolve`] decided for a URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Used as-is: data/blob/network URIs and absolute paths.
    PassThrough(String),
    /// Matched the co-selected file with this name.
    Selected(String),
    /// Nothing matched; carries the basename that was looked for.
    Unresolved(String),
}

/// Final state of a reference after the loader tried to fetch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Resolved,
    UnresolvedCritical,
    UnresolvedNonCritical,
}

/// A URI the loader asked for and what became of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReference {
    pub requested: String,
    pub outcome: ResolutionOutcome,
}

/// A missing non-critical resource. The model is usable without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceWarning {
    /// Basename of the missing resource.
    pub name: String,
    pub requested: String,
}

impl fmt::Display for ResourceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Could not load external resource: {} (the model may display without textures; \
             select all related files together or use GLB)",
            self.name
        )
    }
}

/// Classify a reference that could not be fetched.
#[must_use]
pub fn classify_missing(requested: &str) -> ResolutionOutcome {
    let extension = basename(requested)
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if CRITICAL_EXTENSIONS.contains(&extension.as_str()) {
        ResolutionOutcome::UnresolvedCritical
    } else {
        ResolutionOutcome::UnresolvedNonCritical
    }
}

/// Resolves and fetches the side resources of one load.
///
/// Every fetch is recorded; [`release`](Self::release) ends the load and
/// hands back the record.
#[derive(Debug)]
pub struct ResourceResolver<'a> {
    selection: &'a FileSelection,
    held: Vec<String>,
    references: Vec<ResourceReference>,
    warnings: Vec<ResourceWarning>,
}

impl<'a> ResourceResolver<'a> {
    #[must_use]
    pub fn new(selection: &'a FileSelection) -> Self {
        Self {
            selection,
            held: Vec::new(),
            references: Vec::new(),
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn selection(&self) -> &'a FileSelection {
        self.selection
    }

    /// Decide how `url` would be satisfied, without fetching it.
    #[must_use]
    pub fn resolve(&self, url: &str) -> Resolution {
        if is_pass_through(url) {
            return Resolution::PassThrough(url.to_string());
        }
        let name = basename(url);
        if self.selection.find_by_basename(&name).is_some() {
            Resolution::Selected(name)
        } else {
            Resolution::Unresolved(name)
        }
    }

    /// Fetch the bytes behind `url`.
    ///
    /// Returns `Ok(None)` for a missing non-critical resource (recorded as a
    /// warning).
    ///
    /// # Errors
    /// Returns [`Error::CriticalResourceMissing`] for a missing buffer or model file.
    pub fn fetch(&mut self, url: &str) -> Result<Option<Arc<[u8]>>> {
        tracing::debug!("Loading resource: {}", url);
        let bytes = match self.resolve(url) {
            Resolution::PassThrough(url) => fetch_pass_through(&url),
            Resolution::Selected(name) => {
                let file = self.selection.find_by_basename(&name);
                let bytes = file.map(|f| Arc::clone(&f.bytes));
                if bytes.is_some() {
                    tracing::debug!("Found resource {} in selected files", name);
                    self.held.push(name);
                }
                bytes
            }
            Resolution::Unresolved(_) => None,
        };

        if bytes.is_some() {
            self.record(url, ResolutionOutcome::Resolved);
            return Ok(bytes);
        }

        let outcome = classify_missing(url);
        self.record(url, outcome);
        match outcome {
            ResolutionOutcome::UnresolvedCritical => Err(Error::CriticalResourceMissing {
                name: basename(url),
            }),
            _ => {
                tracing::debug!("External resource not found: {}", url);
                self.warn(url);
                Ok(None)
            }
        }
    }

    /// Record a non-critical problem with a resource that was found but unusable.
    pub fn warn(&mut self, url: &str) {
        if !self.warnings.iter().any(|w| w.requested == url) {
            self.warnings.push(ResourceWarning {
                name: basename(url),
                requested: url.to_string(),
            });
        }
    }

    #[must_use]
    pub fn references(&self) -> &[ResourceReference] {
        &self.references
    }

    /// Drop every held handle and return what the load referenced.
    #[must_use]
    pub fn release(self) -> (Vec<ResourceReference>, Vec<ResourceWarning>) {
        if !self.held.is_empty() {
            tracing::debug!("Releasing {} resource handle(s)", self.held.len());
        }
        (self.references, self.warnings)
    }

    fn record(&mut self, url: &str, outcome: ResolutionOutcome) {
        self.references.push(ResourceReference {
            requested: url.to_string(),
            outcome,
        });
    }
}

fn is_pass_through(url: &str) -> bool {
    url.starts_with("data:")
        || url.starts_with("blob:")
        || url.contains("://")
        || Path::new(url).is_absolute()
}

/// Inline data is decoded and absolute paths are read. Remote and blob
/// handles cannot be fetched offline.
fn fetch_pass_through(url: &str) -> Option<Arc<[u8]>> {
    if let Some(data) = url.strip_prefix("data:") {
        return decode_data_uri(data).map(Into::into);
    }
    if url.starts_with("blob:") || url.contains("://") {
        tracing::debug!("Cannot fetch remote resource offline: {}", url);
        return None;
    }
    std::fs::read(url).ok().map(Into::into)
}

/// Decode the part of a data URI after `data:`.
fn decode_data_uri(data: &str) -> Option<Vec<u8>> {
    let (header, payload) = data.split_once(',')?;
    if header.ends_with(";base64") {
        STANDARD.decode(payload.trim()).ok()
    } else {
        Some(percent_decode(payload).into_bytes())
    }
}

/// The file name a URI points at: no `./`, directories, query or fragment.
#[must_use]
pub fn basename(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let name = path.rsplit(['/', '\\']).next().unwrap_or_default();
    percent_decode(name)
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
