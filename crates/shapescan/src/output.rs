//! Atomic output files.
//!
//! Documents are written to a temporary file in the target directory and
//! renamed into place, so a reader never observes a partial file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use shapescan_vector::{ExportError, VectorFormat};

use crate::error::ScanError;
use crate::pipeline::ScanOutput;

pub const OUTPUT_STEM: &str = "output";

/// `output.svg` / `output.dxf`.
pub fn output_file_name(format: VectorFormat) -> String {
    format!("{OUTPUT_STEM}.{}", format.extension())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WrittenFiles {
    pub svg: PathBuf,
    pub dxf: PathBuf,
}

/// Write `contents` to `dir/file_name` through a rename.
pub fn write_atomic(dir: &Path, file_name: &str, contents: &[u8]) -> Result<PathBuf, ExportError> {
    let target = dir.join(file_name);
    let mut tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".part")
        .tempfile_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(&target).map_err(|e| ExportError::Io(e.error))?;
    Ok(target)
}

/// Write both documents of `output` into `dir`, creating it if needed.
///
/// Either both files exist afterwards or neither does.
pub fn write_outputs(output: &ScanOutput, dir: &Path) -> Result<WrittenFiles, ScanError> {
    fs::create_dir_all(dir).map_err(ExportError::from)?;
    let svg = write_atomic(
        dir,
        &output_file_name(VectorFormat::Svg),
        output.document(VectorFormat::Svg).as_bytes(),
    )?;
    let dxf = match write_atomic(
        dir,
        &output_file_name(VectorFormat::Dxf),
        output.document(VectorFormat::Dxf).as_bytes(),
    ) {
        Ok(p) => p,
        Err(e) => {
            if let Err(rm) = fs::remove_file(&svg) {
                log::warn!("could not remove {}: {rm}", svg.display());
            }
            return Err(e.into());
        }
    };
    log::debug!("[{}] wrote {} and {}", output.request_id, svg.display(), dxf.display());
    Ok(WrittenFiles { svg, dxf })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_the_format() {
        assert_eq!(output_file_name(VectorFormat::Svg), "output.svg");
        assert_eq!(output_file_name(VectorFormat::Dxf), "output.dxf");
    }

    #[test]
    fn atomic_write_leaves_only_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_atomic(dir.path(), "a.svg", b"<svg/>").unwrap();
        assert_eq!(fs::read(&p).unwrap(), b"<svg/>");
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("a.svg")]);

        // overwrite in place
        write_atomic(dir.path(), "a.svg", b"<svg></svg>").unwrap();
        assert_eq!(fs::read_to_string(&p).unwrap(), "<svg></svg>");
    }

    #[test]
    fn missing_directory_is_an_export_failure() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        assert!(matches!(
            write_atomic(&gone, "a.dxf", b"0\nEOF\n"),
            Err(ExportError::Io(_))
        ));
    }
}
