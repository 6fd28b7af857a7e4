use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Stores uploaded model files on disk, one subdirectory per job.
pub struct ModelStore {
    upload_directory: PathBuf,
}

impl ModelStore {
    pub fn new<P: AsRef<Path>>(upload_directory: P) -> Self {
        Self {
            upload_directory: upload_directory.as_ref().to_path_buf(),
        }
    }

    pub fn upload_directory(&self) -> &Path {
        &self.upload_directory
    }

    /// Saves `content` under `<upload_directory>/<job_id>/<filename>` and
    /// returns the stored path. The original filename is preserved; on a
    /// collision within the job directory a numbered variant is used.
    pub fn save(
        &self,
        job_id: &str,
        filename: &str,
        content: &[u8],
    ) -> Result<PathBuf, StorageError> {
        validate_filename(filename)?;

        let dir_path = self.upload_directory.join(job_id);
        self.ensure_directory(&dir_path)?;

        self.save_with_atomic_creation(&dir_path, filename, content)
    }

    /// Writes using exclusive creation so a concurrent save of the same
    /// name cannot clobber the file; collisions get `name_2.ext`, `name_3.ext`, ...
    fn save_with_atomic_creation(
        &self,
        dir_path: &Path,
        filename: &str,
        content: &[u8],
    ) -> Result<PathBuf, StorageError> {
        use std::io::Write;

        let (base, ext) = if let Some(dot_pos) = filename.rfind('.') {
            (&filename[..dot_pos], Some(&filename[dot_pos..]))
        } else {
            (filename, None)
        };

        for counter in 1..=1000 {
            let try_filename = if counter == 1 {
                filename.to_string()
            } else {
                match ext {
                    Some(ext) => format!("{}_{}{}", base, counter, ext),
                    None => format!("{}_{}", base, counter),
                }
            };

            let try_path = dir_path.join(&try_filename);

            // create_new gives O_CREAT | O_EXCL semantics
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&try_path)
            {
                Ok(mut file) => {
                    file.write_all(content)
                        .map_err(|e| StorageError::WriteFile {
                            path: try_path.clone(),
                            source: e,
                        })?;
                    return Ok(try_path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    continue;
                }
                Err(e) => {
                    return Err(StorageError::WriteFile {
                        path: try_path,
                        source: e,
                    });
                }
            }
        }

        Err(StorageError::FileExists(dir_path.join(filename)))
    }

    /// Removes a job's entire upload directory, if present.
    pub fn remove(&self, job_id: &str) -> Result<(), StorageError> {
        let dir_path = self.upload_directory.join(job_id);
        if dir_path.exists() {
            std::fs::remove_dir_all(&dir_path).map_err(|e| StorageError::RemoveDirectory {
                path: dir_path,
                source: e,
            })?;
        }
        Ok(())
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }
}

/// The filename must be a bare name, not a path.
fn validate_filename(filename: &str) -> Result<(), StorageError> {
    if filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains('/')
        || filename.contains('\\')
    {
        return Err(StorageError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = ModelStore::new(temp_dir.path());

        let path = store.save("job-1", "part.stl", b"solid part\nendsolid part\n").unwrap();

        assert!(path.exists());
        assert_eq!(path, temp_dir.path().join("job-1").join("part.stl"));
        assert_eq!(
            std::fs::read(&path).unwrap(),
            b"solid part\nendsolid part\n"
        );
    }

    #[test]
    fn test_save_conflict_resolution() {
        let temp_dir = TempDir::new().unwrap();
        let store = ModelStore::new(temp_dir.path());

        let path1 = store.save("job-1", "part.stl", b"first").unwrap();
        let path2 = store.save("job-1", "part.stl", b"second").unwrap();
        let path3 = store.save("job-1", "part.stl", b"third").unwrap();

        assert!(path1.ends_with("part.stl"));
        assert!(path2.ends_with("part_2.stl"));
        assert!(path3.ends_with("part_3.stl"));
        assert_eq!(std::fs::read(&path1).unwrap(), b"first");
    }

    #[test]
    fn test_same_filename_different_jobs() {
        let temp_dir = TempDir::new().unwrap();
        let store = ModelStore::new(temp_dir.path());

        let path1 = store.save("job-1", "part.stl", b"a").unwrap();
        let path2 = store.save("job-2", "part.stl", b"b").unwrap();

        assert!(path1.ends_with("job-1/part.stl"));
        assert!(path2.ends_with("job-2/part.stl"));
    }

    #[test]
    fn test_rejects_path_traversal() {
        let temp_dir = TempDir::new().unwrap();
        let store = ModelStore::new(temp_dir.path());

        for bad in ["../escape.stl", "a/b.stl", "", "..", "."] {
            let err = store.save("job-1", bad, b"x").unwrap_err();
            assert!(matches!(err, StorageError::InvalidFilename(_)), "{}", bad);
        }
    }

    #[test]
    fn test_save_no_extension() {
        let temp_dir = TempDir::new().unwrap();
        let store = ModelStore::new(temp_dir.path());

        store.save("job-1", "model", b"a").unwrap();
        let path2 = store.save("job-1", "model", b"b").unwrap();

        assert!(path2.ends_with("model_2"));
    }

    #[test]
    fn test_remove_job_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = ModelStore::new(temp_dir.path());

        let path = store.save("job-1", "part.stl", b"x").unwrap();
        assert!(path.exists());

        store.remove("job-1").unwrap();
        assert!(!temp_dir.path().join("job-1").exists());

        // Removing again is fine
        store.remove("job-1").unwrap();
    }
}
