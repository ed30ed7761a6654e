//! Local previews for image entries.
//!
//! A preview is a private temp copy of the selected image. The owning entry
//! holds it exclusively; dropping the entry deletes the file.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use tempfile::TempPath;

use crate::entry::{CandidateFile, FileSource};

#[derive(Debug)]
pub struct Preview {
    path: TempPath,
}

impl Preview {
    /// Create a preview when the candidate is an image; `Ok(None)` otherwise.
    pub fn for_candidate(candidate: &CandidateFile) -> io::Result<Option<Self>> {
        if !is_previewable(&candidate.declared_type) {
            return Ok(None);
        }

        let suffix = format!(".{}", courier_core::extension_of(&candidate.name));
        let mut file = tempfile::Builder::new()
            .prefix("courier-preview-")
            .suffix(&suffix)
            .tempfile()?;

        match &candidate.source {
            FileSource::Path(source) => {
                io::copy(&mut File::open(source)?, &mut file)?;
            }
            FileSource::Memory(bytes) => file.write_all(bytes)?,
        }
        file.flush()?;

        let path = file.into_temp_path();
        tracing::debug!(preview = %path.display(), name = %candidate.name, "Preview created");
        Ok(Some(Self { path }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_previewable(declared_type: &str) -> bool {
    declared_type
        .split(';')
        .next()
        .map(|t| t.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false)
}
