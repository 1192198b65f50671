//! Reading and writing lattice state files.
//!
//! Two text formats are supported, dispatched on file extension: the
//! legacy rectilinear-grid `.vtk` format (DIMENSIONS holds side + 1, spins
//! follow the CELL_DATA header one per line) and the flat `.ph` format (a
//! single side-length line, two skipped header lines, then spins). Loaders
//! produce a plain [`SpinGrid`]; building a live lattice from it is the
//! caller's business.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::potts::{Coord, Lattice, Spin, SpinGrid};

#[derive(Error, Debug)]
pub enum VtkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unrecognized lattice file format: {0}")]
    UnrecognizedFormat(String),

    #[error("missing or malformed DIMENSIONS header")]
    MissingDimensions,

    #[error("bad spin value '{value}' on line {line}")]
    BadSpin { value: String, line: usize },

    #[error("expected {expected} spins, found {found}")]
    TruncatedData { expected: usize, found: usize },
}

/// Load a lattice state, picking the parser from the file extension.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<SpinGrid, VtkError> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("vtk") => from_vtk(path),
        Some("ph") => from_ph(path),
        _ => Err(VtkError::UnrecognizedFormat(path.display().to_string())),
    }
}

/// Parse the legacy rectilinear-grid format.
pub fn from_vtk<P: AsRef<Path>>(path: P) -> Result<SpinGrid, VtkError> {
    let path = path.as_ref();
    info!(path = %path.display(), "loading VTK lattice file");

    let reader = BufReader::new(File::open(path)?);

    let mut side_length: Option<usize> = None;
    let mut spins: Vec<Spin> = Vec::new();
    let mut expected = 0usize;
    let mut in_cell_data = false;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if side_length.is_none() {
            if let Some(rest) = line.strip_prefix("DIMENSIONS") {
                let dim: usize = rest
                    .split_whitespace()
                    .next()
                    .and_then(|word| word.parse().ok())
                    .ok_or(VtkError::MissingDimensions)?;
                if dim < 2 {
                    return Err(VtkError::MissingDimensions);
                }
                let side = dim - 1;
                expected = side * side * side;
                spins.reserve(expected);
                side_length = Some(side);
            }
            continue;
        }
        if !in_cell_data {
            in_cell_data = line.starts_with("CELL_DATA");
            continue;
        }
        // Within CELL_DATA, only digit-led lines are spins; the SCALARS
        // and LOOKUP_TABLE headers pass through here.
        if line.as_bytes().first().is_some_and(|b| b.is_ascii_digit()) {
            let spin = line
                .trim()
                .parse()
                .map_err(|_| VtkError::BadSpin {
                    value: line.clone(),
                    line: line_no + 1,
                })?;
            spins.push(spin);
            if spins.len() == expected {
                break;
            }
        } else if !spins.is_empty() {
            break;
        }
    }

    let side_length = side_length.ok_or(VtkError::MissingDimensions)?;
    if spins.len() != expected {
        return Err(VtkError::TruncatedData {
            expected,
            found: spins.len(),
        });
    }
    Ok(SpinGrid { side_length, spins })
}

/// Parse the flat format: side length, two header lines, then spins.
pub fn from_ph<P: AsRef<Path>>(path: P) -> Result<SpinGrid, VtkError> {
    let path = path.as_ref();
    info!(path = %path.display(), "loading PH lattice file");

    let reader = BufReader::new(File::open(path)?);

    let mut side_length: Option<usize> = None;
    let mut spins: Vec<Spin> = Vec::new();
    let mut expected = 0usize;
    let mut skipped_headers = 0u8;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if side_length.is_none() {
            let side: usize = line
                .split_whitespace()
                .next()
                .and_then(|word| word.parse().ok())
                .ok_or(VtkError::MissingDimensions)?;
            expected = side * side * side;
            spins.reserve(expected);
            side_length = Some(side);
            continue;
        }
        if skipped_headers < 2 {
            skipped_headers += 1;
            continue;
        }
        if line.as_bytes().first().is_some_and(|b| b.is_ascii_digit()) {
            let spin = line
                .trim()
                .parse()
                .map_err(|_| VtkError::BadSpin {
                    value: line.clone(),
                    line: line_no + 1,
                })?;
            spins.push(spin);
            if spins.len() == expected {
                break;
            }
        } else if !spins.is_empty() {
            break;
        }
    }

    let side_length = side_length.ok_or(VtkError::MissingDimensions)?;
    if spins.len() != expected {
        return Err(VtkError::TruncatedData {
            expected,
            found: spins.len(),
        });
    }
    Ok(SpinGrid { side_length, spins })
}

/// Write the lattice's current spins as a rectilinear-grid file.
pub fn to_vtk<P: AsRef<Path>>(path: P, lattice: &Lattice) -> Result<(), VtkError> {
    let path = path.as_ref();
    info!(path = %path.display(), "writing VTK lattice file");

    let mut writer = BufWriter::new(File::create(path)?);
    let side = lattice.side_length();

    writeln!(writer, "# vtk DataFile Version 2.0")?;
    writeln!(writer, "grain growth lattice")?;
    writeln!(writer, "ASCII")?;
    writeln!(writer, "DATASET RECTILINEAR_GRID")?;
    writeln!(writer, "DIMENSIONS {0} {0} {0}", side + 1)?;

    for axis in ["X", "Y", "Z"] {
        writeln!(writer, "{}_COORDINATES {} Float", axis, side + 1)?;
        for i in 0..=side {
            writeln!(writer, "{i}")?;
        }
    }

    writeln!(writer, "CELL_DATA {}", side * side * side)?;
    writeln!(writer, "SCALARS GrainIDs int 1")?;
    writeln!(writer, "LOOKUP_TABLE default")?;
    for z in 0..side as Coord {
        for y in 0..side as Coord {
            for x in 0..side as Coord {
                writeln!(writer, "{}", lattice.voxel(x, y, z).spin)?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}

/// Nearest-neighbour upscaling of a spin grid by `multiplier`.
pub fn scale_grid(grid: &SpinGrid, multiplier: f64) -> SpinGrid {
    info!(multiplier, "scaling lattice");

    let old_side = grid.side_length;
    let new_side = (old_side as f64 * multiplier) as usize;
    let mut spins = Vec::with_capacity(new_side * new_side * new_side);
    for z in 0..new_side {
        for y in 0..new_side {
            for x in 0..new_side {
                let sx = (x as f64 / multiplier) as usize;
                let sy = (y as f64 / multiplier) as usize;
                let sz = (z as f64 / multiplier) as usize;
                spins.push(grid.spins[sx + sy * old_side + sz * old_side * old_side]);
            }
        }
    }
    SpinGrid {
        side_length: new_side,
        spins,
    }
}
