//! Model loading
//!
//! A load starts from a [`FileSelection`]: the primary model file plus any
//! side files (buffers, textures, material libraries) the user selected with
//! it. The primary file's extension picks the loader; side files are found by
//! basename through the [`ResourceResolver`].
//!
//! SPDX-FileCopyrightText: 2025 `CyberDeco`
//!
//! SPDX-License-Identifier: MIT

mod gltf_loader;
mod obj_loader;
pub mod resolver;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::scene::{MeshInventory, Model};

pub use resolver::{
    Resolution, ResolutionOutcome, ResourceReference, ResourceResolver, ResourceWarning,
};

// ============================================================================
// Formats
// ============================================================================

/// Model formats the loader dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFormat {
    /// JSON glTF, usually with external `.bin` and texture files.
    Gltf,
    /// Binary glTF with an embedded buffer.
    Glb,
    /// Wavefront OBJ, optionally with an MTL library.
    Obj,
}

impl ModelFormat {
    /// Format for a file extension (case-insensitive).
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedFormat`] for anything other than gltf, glb or obj.
    pub fn from_extension(extension: &str) -> Result<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "gltf" => Ok(Self::Gltf),
            "glb" => Ok(Self::Glb),
            "obj" => Ok(Self::Obj),
            other => Err(Error::UnsupportedFormat {
                extension: other.to_string(),
            }),
        }
    }

    /// Format of a file name or path.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedFormat`] if the extension is missing or unknown.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(extension)
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Gltf => "gltf",
            Self::Glb => "glb",
            Self::Obj => "obj",
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gltf => "GLTF",
            Self::Glb => "GLB",
            Self::Obj => "OBJ",
        })
    }
}

// ============================================================================
// File Selection
// ============================================================================

/// One file of a selection, read fully into memory.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    /// Basename used for resource matching.
    pub name: String,
    /// Where the file came from, if it was read from disk.
    pub path: Option<PathBuf>,
    pub bytes: Arc<[u8]>,
}

impl SelectedFile {
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            path: None,
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            path: Some(path.to_path_buf()),
            bytes: bytes.into(),
        })
    }

    /// Lowercased extension of the file name.
    #[must_use]
    pub fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default()
    }
}

/// The primary model file and its side files.
///
/// Never empty; the first file is the primary.
#[derive(Debug, Clone)]
pub struct FileSelection {
    files: Vec<SelectedFile>,
}

impl FileSelection {
    /// Build a selection from already loaded files. The first file is the primary.
    ///
    /// # Errors
    /// Returns [`Error::EmptySelection`] if `files` is empty.
    pub fn new(files: Vec<SelectedFile>) -> Result<Self> {
        if files.is_empty() {
            return Err(Error::EmptySelection);
        }
        Ok(Self { files })
    }

    /// Read a model file and its side files from disk.
    ///
    /// # Errors
    /// Returns an error if any file cannot be read.
    pub fn from_paths(primary: impl AsRef<Path>, side_files: &[PathBuf]) -> Result<Self> {
        let mut files = Vec::with_capacity(side_files.len() + 1);
        files.push(SelectedFile::read(primary)?);
        for path in side_files {
            files.push(SelectedFile::read(path)?);
        }
        Self::new(files)
    }

    /// Read a model file and every regular file next to it.
    ///
    /// # Errors
    /// Returns an error if the model or a sibling cannot be read.
    pub fn with_siblings(primary: impl AsRef<Path>) -> Result<Self> {
        let primary = primary.as_ref();
        let directory = primary
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let primary_name = primary.file_name();

        let mut siblings = Vec::new();
        for entry in WalkDir::new(directory)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            if entry.file_type().is_file() && Some(entry.file_name()) != primary_name {
                siblings.push(entry.into_path());
            }
        }

        tracing::debug!(
            "Co-selecting {} sibling file(s) from {}",
            siblings.len(),
            directory.display()
        );
        Self::from_paths(primary, &siblings)
    }

    #[must_use]
    pub fn primary(&self) -> &SelectedFile {
        &self.files[0]
    }

    #[must_use]
    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    /// Side file whose name is exactly `name`.
    #[must_use]
    pub fn find_by_basename(&self, name: &str) -> Option<&SelectedFile> {
        self.files.iter().skip(1).find(|f| f.name == name)
    }

    /// First side file with the given extension (case-insensitive).
    #[must_use]
    pub fn find_by_extension(&self, extension: &str) -> Option<&SelectedFile> {
        self.files
            .iter()
            .skip(1)
            .find(|f| f.extension().eq_ignore_ascii_case(extension))
    }
}

// ============================================================================
// Loading
// ============================================================================

/// A loaded model with what the load had to say about it.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub model: Model,
    pub format: ModelFormat,
    /// Non-critical resources that could not be found.
    pub warnings: Vec<ResourceWarning>,
    /// Every external reference the loader tried to resolve.
    pub references: Vec<ResourceReference>,
    pub inventory: MeshInventory,
}

/// Load the primary file of `selection`.
///
/// # Errors
/// - [`Error::UnsupportedFormat`] before any parsing if the extension is unknown.
/// - [`Error::CriticalResourceMissing`] if a buffer or nested model file is missing.
/// - [`Error::ModelLoad`] if the parser rejects the file.
pub fn load_model(selection: &FileSelection) -> Result<LoadReport> {
    let primary = selection.primary();
    let format = ModelFormat::from_path(&primary.name)?;
    tracing::info!("Loading {} model: {}", format, primary.name);

    let mut resolver = ResourceResolver::new(selection);
    let model = match format {
        ModelFormat::Gltf | ModelFormat::Glb => gltf_loader::load(primary, format, &mut resolver),
        ModelFormat::Obj => obj_loader::load(primary, &mut resolver),
    };
    let (references, warnings) = resolver.release();
    let model = model?;

    for warning in &warnings {
        tracing::warn!("{warning}");
    }

    let inventory = MeshInventory::collect(&model);
    tracing::info!(
        "Model loaded: {} mesh(es), {} triangle(s), {} textured primitive(s)",
        inventory.meshes,
        inventory.triangles,
        inventory.textured_primitives
    );

    Ok(LoadReport {
        model,
        format,
        warnings,
        references,
        inventory,
    })
}

/// Stem of a file name, used to name loaded models.
fn model_name(file: &SelectedFile) -> String {
    Path::new(&file.name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.name.clone())
}
