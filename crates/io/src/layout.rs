//! Avalanche directory layout
//!
//! ```text
//! <avaDir>/Inputs/<dem>.asc
//! <avaDir>/Inputs/{REL,ENT,RES,SECREL,RELTH,DAM,LINES,POINTS}/
//! <avaDir>/Outputs/<module>/{peakFiles,particles,reports}/
//! ```

use avaframe_core::error::{AvaError, AvaResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Optional feature folders under `Inputs/`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputFolder {
    /// Release areas (required)
    Rel,
    /// Entrainment areas
    Ent,
    /// Resistance areas
    Res,
    /// Secondary release areas
    SecRel,
    /// Release thickness rasters
    RelTh,
    /// Dams
    Dam,
    /// Lines (avalanche paths, split points)
    Lines,
    /// Points
    Points,
}

impl InputFolder {
    /// Every folder, in directory-listing order
    pub const ALL: [Self; 8] = [
        Self::Rel,
        Self::Ent,
        Self::Res,
        Self::SecRel,
        Self::RelTh,
        Self::Dam,
        Self::Lines,
        Self::Points,
    ];

    /// Folder name on disk
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Rel => "REL",
            Self::Ent => "ENT",
            Self::Res => "RES",
            Self::SecRel => "SECREL",
            Self::RelTh => "RELTH",
            Self::Dam => "DAM",
            Self::Lines => "LINES",
            Self::Points => "POINTS",
        }
    }
}

/// Files found under `<avaDir>/Inputs`
#[derive(Debug, Clone)]
pub struct InputLayout {
    /// Avalanche directory
    pub ava_dir: PathBuf,
    /// The single DEM raster
    pub dem: PathBuf,
    /// Files of each present feature folder, sorted by name
    pub folders: Vec<(InputFolder, Vec<PathBuf>)>,
}

impl InputLayout {
    /// Whether a folder exists and holds at least one file
    pub fn has(&self, folder: InputFolder) -> bool {
        self.files(folder).is_some_and(|f| !f.is_empty())
    }

    /// Files of a folder, `None` when the folder is absent
    pub fn files(&self, folder: InputFolder) -> Option<&[PathBuf]> {
        self.folders
            .iter()
            .find(|(f, _)| *f == folder)
            .map(|(_, files)| files.as_slice())
    }

    /// Release files; at least one is guaranteed by [`discover_inputs`]
    pub fn release_files(&self) -> &[PathBuf] {
        self.files(InputFolder::Rel).unwrap_or(&[])
    }
}

fn sorted_files(dir: &Path, extension: Option<&str>) -> AvaResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = extension.is_none_or(|ext| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        });
        if matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Locate the inputs of an avalanche directory.
///
/// Fails with [`AvaError::InputMissing`] unless `Inputs/` holds exactly one `*.asc` DEM and
/// a non-empty `REL/` folder.
pub fn discover_inputs(ava_dir: &Path) -> AvaResult<InputLayout> {
    let inputs = ava_dir.join("Inputs");
    if !inputs.is_dir() {
        return Err(AvaError::InputMissing {
            path: inputs,
            message: "no Inputs directory".into(),
        });
    }

    let mut dems = sorted_files(&inputs, Some("asc"))?;
    let dem = match dems.len() {
        1 => dems.remove(0),
        0 => {
            return Err(AvaError::InputMissing {
                path: inputs,
                message: "no DEM (*.asc) found".into(),
            })
        }
        n => {
            return Err(AvaError::InputMissing {
                path: inputs,
                message: format!("expected exactly one DEM (*.asc), found {n}"),
            })
        }
    };

    let mut folders = Vec::new();
    for folder in InputFolder::ALL {
        let dir = inputs.join(folder.dir_name());
        if dir.is_dir() {
            let files = sorted_files(&dir, None)?;
            debug!("{}: {} file(s)", folder.dir_name(), files.len());
            folders.push((folder, files));
        }
    }
    let layout = InputLayout {
        ava_dir: ava_dir.to_path_buf(),
        dem,
        folders,
    };
    if !layout.has(InputFolder::Rel) {
        return Err(AvaError::InputMissing {
            path: inputs.join(InputFolder::Rel.dir_name()),
            message: "no release area files".into(),
        });
    }
    info!(
        "Inputs of {}: DEM {}, {} release file(s)",
        ava_dir.display(),
        layout.dem.display(),
        layout.release_files().len()
    );
    Ok(layout)
}

/// Output directories of one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    /// `<avaDir>/Outputs/<module>`
    pub fn new(ava_dir: &Path, module: &str) -> Self {
        Self {
            root: ava_dir.join("Outputs").join(module),
        }
    }

    /// Module output root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Peak rasters and mass logs
    pub fn peak_files(&self) -> PathBuf {
        self.root.join("peakFiles")
    }

    /// Particle snapshots
    pub fn particles(&self) -> PathBuf {
        self.root.join("particles")
    }

    /// Tables such as AIMEC results
    pub fn reports(&self) -> PathBuf {
        self.root.join("reports")
    }

    /// Create every output directory
    pub fn create(&self) -> AvaResult<()> {
        for dir in [self.peak_files(), self.particles(), self.reports()] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_discovers_dem_and_folders() {
        let tmp = tempfile::tempdir().unwrap();
        let ava = tmp.path();
        touch(&ava.join("Inputs/dem.asc"));
        touch(&ava.join("Inputs/REL/relB.shp"));
        touch(&ava.join("Inputs/REL/relA.shp"));
        fs::create_dir_all(ava.join("Inputs/ENT")).unwrap();

        let layout = discover_inputs(ava).unwrap();
        assert!(layout.dem.ends_with("dem.asc"));
        assert_eq!(layout.release_files().len(), 2);
        assert!(layout.release_files()[0].ends_with("relA.shp"));
        assert!(layout.files(InputFolder::Ent).is_some());
        assert!(!layout.has(InputFolder::Ent));
        assert!(layout.files(InputFolder::Res).is_none());
    }

    #[test]
    fn test_dem_count_must_be_one() {
        let tmp = tempfile::tempdir().unwrap();
        let ava = tmp.path();
        touch(&ava.join("Inputs/REL/rel.shp"));
        assert!(matches!(discover_inputs(ava), Err(AvaError::InputMissing { .. })));
        touch(&ava.join("Inputs/a.asc"));
        touch(&ava.join("Inputs/b.asc"));
        assert!(matches!(discover_inputs(ava), Err(AvaError::InputMissing { .. })));
    }

    #[test]
    fn test_output_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let out = OutputLayout::new(tmp.path(), "com1DFA");
        out.create().unwrap();
        assert!(out.peak_files().is_dir());
        assert!(out.reports().ends_with("Outputs/com1DFA/reports"));
    }
}
