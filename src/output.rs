//! Grid output formatting (diagnostic dump and CSV).

use crate::error::Result;
use crate::grid::Grid;
use std::io::Write;

/// Write the grid as tab-separated rows, one line per grid row.
///
/// Format:
/// ```text
/// 1	1	1
/// 1	0.5	0
/// 1	0	0
/// ```
pub fn write_grid<W: Write>(grid: &Grid, writer: &mut W) -> Result<()> {
    for i in 0..grid.rows() {
        for value in grid.row(i) {
            write!(writer, "{}\t", value)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Write the grid as CSV with a `row,col,value` header.
///
/// Format:
/// ```csv
/// row,col,value
/// 0,0,1
/// 0,1,1
/// ```
pub fn write_grid_csv<W: Write>(grid: &Grid, writer: &mut W) -> Result<()> {
    writeln!(writer, "row,col,value")?;
    for i in 0..grid.rows() {
        for (j, value) in grid.row(i).iter().enumerate() {
            writeln!(writer, "{},{},{}", i, j, value)?;
        }
    }
    Ok(())
}
