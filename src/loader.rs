//! Reads image files under a root directory into `ImageRecord`s.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::models::ImageRecord;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq)]
pub struct LoaderOptions
{
    pub root: PathBuf,
    /// Compared case-insensitively, without the leading dot.
    pub extension: String,
    /// When false only direct children of `root` are read.
    pub recursive: bool,
}

impl LoaderOptions
{
    pub fn new(root: &Path) -> Self
    {
        LoaderOptions
        {
            root: root.to_path_buf(),
            extension: "jpeg".to_string(),
            recursive: true,
        }
    }
}

fn has_extension(path: &Path, extension: &str) -> bool
{
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Lists matching files, sorted by path.
pub fn find_image_files(options: &LoaderOptions) -> Result<Vec<PathBuf>>
{
    let root = match fs::canonicalize(&options.root) {
        Ok(root) => root,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::InputPathNotFound(options.root.clone())),
        Err(e) => return Err(e.into()),
    };

    let mut walker = WalkDir::new(&root).min_depth(1).sort_by_file_name();
    if !options.recursive {
        walker = walker.max_depth(1);
    }

    let mut paths = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && has_extension(entry.path(), &options.extension) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Reads every matching file in parallel on the session's pool.
/// A file that cannot be read fails the whole load.
pub fn load_images(session: &Session, options: &LoaderOptions) -> Result<Vec<ImageRecord>>
{
    let paths = find_image_files(options)?;
    debug!("Found {} .{} files under {:?}", paths.len(), options.extension, options.root);

    let records = session.try_map(paths, |path| -> Result<ImageRecord> {
        let content = fs::read(&path)?;
        let path = path.into_os_string().into_string().map_err(|_| Error::PathBufToString)?;
        Ok(ImageRecord { id: Uuid::new_v4(), path, content })
    })?;

    info!("Loaded {} images from {:?}", records.len(), options.root);
    Ok(records)
}
