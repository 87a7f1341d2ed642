//! Upload storage on the local filesystem.
//!
//! Payloads land under `<root>/<user_id>/`. Name conflicts are resolved
//! with numbered suffixes via atomic create-new, so two concurrent
//! uploads of the same filename never clobber each other.

use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::StorageError;

pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persists an upload payload and returns the stored path.
    pub fn store(
        &self,
        user_id: &str,
        file_name: &str,
        payload: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let directory = self.root.join(user_id);
        ensure_directory(&directory)?;

        let path = self.create_exclusive(&directory, file_name, payload)?;
        debug!("Stored upload {} at {}", file_name, path.display());
        Ok(path)
    }

    /// Creates the file with O_EXCL semantics, appending `_2`, `_3`, ...
    /// before the extension until a free name is found.
    fn create_exclusive(
        &self,
        directory: &Path,
        file_name: &str,
        payload: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let (base, extension) = match file_name.rfind('.') {
            Some(dot) => (&file_name[..dot], Some(&file_name[dot..])),
            None => (file_name, None),
        };

        for counter in 1..=1000 {
            let candidate = if counter == 1 {
                file_name.to_string()
            } else {
                match extension {
                    Some(ext) => format!("{}_{}{}", base, counter, ext),
                    None => format!("{}_{}", base, counter),
                }
            };

            let path = directory.join(&candidate);
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut file) => {
                    file.write_all(payload)
                        .map_err(|e| StorageError::WriteFile {
                            path: path.clone(),
                            source: e,
                        })?;
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StorageError::WriteFile { path, source: e });
                }
            }
        }

        Err(StorageError::TooManyConflicts(directory.join(file_name)))
    }

    /// Removes a stored upload; missing files are fine.
    pub fn remove(&self, path: &Path) -> Result<(), StorageError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::WriteFile {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}
