//! Writing the report to disk

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

pub const DEFAULT_OUTPUT_NAME: &str = "interactive_tree";

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Output file {0} already exists; use --force to overwrite")]
    AlreadyExists(PathBuf),

    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// `<dir>/<name>.html`, with the current directory when `dir` is `None`.
/// An `.html` suffix already on `name` is not doubled.
pub fn output_path(dir: Option<&Path>, name: &str) -> PathBuf {
    let file_name = if name.to_ascii_lowercase().ends_with(".html") {
        name.to_string()
    } else {
        format!("{name}.html")
    };
    match dir {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Make sure the output can be written: create the directory if needed and
/// refuse to clobber an existing file unless `force` is set.
///
/// Run this before any expensive work so a bad path fails fast.
pub fn prepare_output(path: &Path, force: bool) -> Result<(), OutputError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            debug!("Creating output directory {}", dir.display());
            fs::create_dir_all(dir).map_err(|source| OutputError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }
    }

    if path.exists() {
        if !force {
            return Err(OutputError::AlreadyExists(path.to_path_buf()));
        }
        info!("Overwriting existing file {}", path.display());
    }
    Ok(())
}

pub fn write_report(path: &Path, html: &str) -> Result<(), OutputError> {
    fs::write(path, html).map_err(|source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    })
}
