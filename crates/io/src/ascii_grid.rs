//! ESRI ASCII grid reading and writing
//!
//! Header keys are matched case-insensitively. `xllcorner`/`yllcorner` headers are
//! converted to cell-centre coordinates on read. Files list rows north to south; rasters
//! store row 0 at the south, so rows are flipped both ways. Cells equal to
//! `nodata_value` become NaN and are written back as `nodata_value`.

use avaframe_core::error::{AvaError, AvaResult};
use avaframe_core::grid::raster::{Raster, RasterHeader};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const HEADER_LINES: usize = 6;

fn format_error(path: &Path, message: impl Into<String>) -> AvaError {
    AvaError::InputFormat {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Read an ESRI ASCII grid file
pub fn read_ascii_grid(path: &Path) -> AvaResult<Raster> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AvaError::InputMissing {
            path: path.to_path_buf(),
            message: "raster file not found".into(),
        },
        _ => AvaError::Io(e),
    })?;
    parse_ascii_grid(&content, path)
}

/// Parse ESRI ASCII grid text; `path` only labels errors.
pub fn parse_ascii_grid(content: &str, path: &Path) -> AvaResult<Raster> {
    let mut ncols = None;
    let mut nrows = None;
    let mut xll = None;
    let mut yll = None;
    let mut corner = (false, false);
    let mut cellsize = None;
    let mut nodata = -9999.0;

    let mut lines = content.lines().filter(|l| !l.trim().is_empty()).peekable();
    for _ in 0..HEADER_LINES {
        let Some(line) = lines.peek() else { break };
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            break;
        };
        let key = key.to_ascii_lowercase();
        if key.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.') {
            break;
        }
        let number: f64 = value
            .parse()
            .map_err(|_| format_error(path, format!("header '{key}' has non-numeric value '{value}'")))?;
        match key.as_str() {
            "ncols" => ncols = Some(number as usize),
            "nrows" => nrows = Some(number as usize),
            "xllcenter" => xll = Some(number),
            "yllcenter" => yll = Some(number),
            "xllcorner" => {
                xll = Some(number);
                corner.0 = true;
            }
            "yllcorner" => {
                yll = Some(number);
                corner.1 = true;
            }
            "cellsize" => cellsize = Some(number),
            "nodata_value" => nodata = number,
            other => return Err(format_error(path, format!("unknown header key '{other}'"))),
        }
        lines.next();
    }

    let missing = |name: &str| format_error(path, format!("header is missing '{name}'"));
    let ncols = ncols.ok_or_else(|| missing("ncols"))?;
    let nrows = nrows.ok_or_else(|| missing("nrows"))?;
    let cellsize = cellsize.ok_or_else(|| missing("cellsize"))?;
    let mut xll = xll.ok_or_else(|| missing("xllcenter"))?;
    let mut yll = yll.ok_or_else(|| missing("yllcenter"))?;
    if corner.0 {
        xll += cellsize / 2.0;
    }
    if corner.1 {
        yll += cellsize / 2.0;
    }

    let mut header = RasterHeader::new(ncols, nrows, cellsize, xll, yll);
    header.nodata_value = nodata;
    header.validate()?;

    let mut values = Vec::with_capacity(header.len());
    for token in lines.flat_map(str::split_whitespace) {
        let v: f64 = token
            .parse()
            .map_err(|_| format_error(path, format!("non-numeric cell value '{token}'")))?;
        values.push(if v == nodata { f64::NAN } else { v });
    }
    if values.len() != header.len() {
        return Err(format_error(
            path,
            format!("expected {} cell values, found {}", header.len(), values.len()),
        ));
    }

    let mut data = Vec::with_capacity(values.len());
    for file_row in values.chunks(ncols).rev() {
        data.extend_from_slice(file_row);
    }
    Raster::from_data(header, data)
}

/// Render a raster as ESRI ASCII grid text with a cell-centre header
pub fn format_ascii_grid(raster: &Raster) -> String {
    let h = &raster.header;
    let mut out = String::with_capacity(h.len() * 8 + 128);
    let _ = writeln!(out, "ncols {}", h.ncols);
    let _ = writeln!(out, "nrows {}", h.nrows);
    let _ = writeln!(out, "xllcenter {}", h.xllcenter);
    let _ = writeln!(out, "yllcenter {}", h.yllcenter);
    let _ = writeln!(out, "cellsize {}", h.cellsize);
    let _ = writeln!(out, "nodata_value {}", h.nodata_value);
    for row in raster.data.chunks(h.ncols).rev() {
        let mut first = true;
        for &v in row {
            if !first {
                out.push(' ');
            }
            first = false;
            let v = if v.is_finite() { v } else { h.nodata_value };
            let _ = write!(out, "{v}");
        }
        out.push('\n');
    }
    out
}

/// Write a raster as an ESRI ASCII grid file
pub fn write_ascii_grid(path: &Path, raster: &Raster) -> AvaResult<()> {
    fs::write(path, format_ascii_grid(raster))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const GRID: &str = "NCOLS 3\nNROWS 2\nXLLCORNER 100\nYLLCORNER 200\nCELLSIZE 10\nNODATA_VALUE -9999\n1 2 3\n4 -9999 6\n";

    #[test]
    fn test_parse_corner_header_and_flip() {
        let r = parse_ascii_grid(GRID, Path::new("dem.asc")).unwrap();
        assert_eq!((r.header.ncols, r.header.nrows), (3, 2));
        assert_relative_eq!(r.header.xllcenter, 105.0);
        assert_relative_eq!(r.header.yllcenter, 205.0);
        // Last file row is the southern row 0
        assert_relative_eq!(r.get(0, 0), 4.0);
        assert!(r.get(1, 0).is_nan());
        assert_relative_eq!(r.get(2, 1), 3.0);
    }

    #[test]
    fn test_format_round_trip() {
        let r = parse_ascii_grid(GRID, Path::new("dem.asc")).unwrap();
        let text = format_ascii_grid(&r);
        assert!(text.starts_with("ncols 3\nnrows 2\nxllcenter 105\n"));
        assert!(text.ends_with("1 2 3\n4 -9999 6\n"));
        let back = parse_ascii_grid(&text, Path::new("out.asc")).unwrap();
        assert_eq!(back.header, r.header);
        assert_relative_eq!(back.get(2, 0), 6.0);
    }

    #[test]
    fn test_malformed_grids() {
        let short = "ncols 2\nnrows 2\nxllcenter 0\nyllcenter 0\ncellsize 1\n1 2 3\n";
        assert!(matches!(
            parse_ascii_grid(short, Path::new("a.asc")),
            Err(AvaError::InputFormat { .. })
        ));
        let no_size = "ncols 1\nnrows 1\nxllcenter 0\nyllcenter 0\n5\n";
        assert!(matches!(
            parse_ascii_grid(no_size, Path::new("b.asc")),
            Err(AvaError::InputFormat { .. })
        ));
    }
}
