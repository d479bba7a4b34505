//! Calculator key grid and pointer-to-key resolution.

use glam::DVec2;
use log::debug;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("keyboard layout has no keys")]
    Empty,
    #[error("layout row {row} has {len} keys, expected {expected}")]
    Jagged {
        row: usize,
        len: usize,
        expected: usize,
    },
    #[error("layout cell ({row}, {col}) has a blank target id")]
    BlankTarget { row: usize, col: usize },
    #[error("cell ({row}, {col}) is outside the {rows}x{cols} grid")]
    OutOfRange {
        row: i64,
        col: i64,
        rows: usize,
        cols: usize,
    },
    #[error("cell size must be positive, got {width}x{height}")]
    CellSize { width: f64, height: f64 },
    #[error("header height must be a finite non-negative number, got {0}")]
    HeaderHeight(f64),
}

/// A validated rectangular grid of target ids below a display header.
///
/// Wide keys simply repeat their id in adjacent cells.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyboardLayout {
    rows: Vec<Vec<String>>,
    cols: usize,
    cell: DVec2,
    header_height: f64,
}

impl KeyboardLayout {
    pub fn new(
        rows: Vec<Vec<String>>,
        cell: DVec2,
        header_height: f64,
    ) -> Result<Self, LayoutError> {
        if !(cell.x > 0.0 && cell.y > 0.0) {
            return Err(LayoutError::CellSize {
                width: cell.x,
                height: cell.y,
            });
        }
        if !(header_height.is_finite() && header_height >= 0.0) {
            return Err(LayoutError::HeaderHeight(header_height));
        }
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        if cols == 0 {
            return Err(LayoutError::Empty);
        }
        for (r, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(LayoutError::Jagged {
                    row: r,
                    len: row.len(),
                    expected: cols,
                });
            }
            if let Some(c) = row.iter().position(|id| id.trim().is_empty()) {
                return Err(LayoutError::BlankTarget { row: r, col: c });
            }
        }
        Ok(Self {
            rows,
            cols,
            cell,
            header_height,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Size of the key area, header excluded.
    pub fn grid_size(&self) -> DVec2 {
        DVec2::new(self.cols as f64, self.rows.len() as f64) * self.cell
    }

    pub fn header_height(&self) -> f64 {
        self.header_height
    }

    /// Distinct target ids in reading order.
    pub fn targets(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for id in self.rows.iter().flatten() {
            if !out.contains(&id.as_str()) {
                out.push(id);
            }
        }
        out
    }

    /// Checked grid lookup.
    pub fn cell(&self, row: i64, col: i64) -> Result<&str, LayoutError> {
        let out_of_range = || LayoutError::OutOfRange {
            row,
            col,
            rows: self.rows.len(),
            cols: self.cols,
        };
        let r = usize::try_from(row).map_err(|_| out_of_range())?;
        let c = usize::try_from(col).map_err(|_| out_of_range())?;
        self.rows
            .get(r)
            .and_then(|cells| cells.get(c))
            .map(String::as_str)
            .ok_or_else(out_of_range)
    }

    /// Key under `position` (relative to the field center), if any.
    ///
    /// Points above the key area (over the display) and points whose cell
    /// falls outside the grid resolve to `None`.
    pub fn resolve(&self, position: DVec2, bound: DVec2) -> Option<&str> {
        let local = position + bound - DVec2::new(0.0, self.header_height);
        if local.y < 0.0 {
            return None;
        }
        let col = (local.x / self.cell.x).floor() as i64;
        let row = (local.y / self.cell.y).floor() as i64;
        match self.cell(row, col) {
            Ok(id) => Some(id),
            Err(e) => {
                debug!("no key under ({:.1}, {:.1}): {e}", position.x, position.y);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculator() -> KeyboardLayout {
        let rows = [
            ["key-clear", "key-sign", "key-percent", "key-divide"],
            ["key-7", "key-8", "key-9", "key-multiply"],
            ["key-4", "key-5", "key-6", "key-subtract"],
            ["key-1", "key-2", "key-3", "key-add"],
            ["key-0", "key-0", "key-dot", "key-equals"],
        ]
        .iter()
        .map(|r| r.iter().map(|s| s.to_string()).collect())
        .collect();
        KeyboardLayout::new(rows, DVec2::splat(80.0), 120.0).unwrap()
    }

    fn bound() -> DVec2 {
        DVec2::new(160.0, 260.0)
    }

    #[test]
    fn center_is_key_9() {
        assert_eq!(calculator().resolve(DVec2::ZERO, bound()), Some("key-9"));
    }

    #[test]
    fn wide_zero_covers_two_cells() {
        let l = calculator();
        assert_eq!(l.resolve(DVec2::new(-150.0, 250.0), bound()), Some("key-0"));
        assert_eq!(l.resolve(DVec2::new(-10.0, 250.0), bound()), Some("key-0"));
        assert_eq!(l.resolve(DVec2::new(10.0, 250.0), bound()), Some("key-dot"));
    }

    #[test]
    fn header_resolves_to_none() {
        let l = calculator();
        // local.y = -200 + 260 - 120 = -60
        assert_eq!(l.resolve(DVec2::new(0.0, -200.0), bound()), None);
        assert_eq!(l.resolve(DVec2::new(0.0, -140.0), bound()), Some("key-percent"));
    }

    #[test]
    fn outside_grid_is_none_not_panic() {
        let l = calculator();
        assert_eq!(l.resolve(DVec2::new(160.0, 0.0), bound()), None);
        assert_eq!(l.resolve(DVec2::new(0.0, 260.0), bound()), None);
        assert_eq!(l.resolve(DVec2::new(-170.0, 0.0), bound()), None);
        assert!(matches!(l.cell(5, 0), Err(LayoutError::OutOfRange { .. })));
        assert!(matches!(l.cell(0, -1), Err(LayoutError::OutOfRange { .. })));
    }

    #[test]
    fn jagged_layout_is_rejected() {
        let rows = vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["c".to_string()],
        ];
        let err = KeyboardLayout::new(rows, DVec2::splat(80.0), 0.0).unwrap_err();
        assert_eq!(
            err,
            LayoutError::Jagged {
                row: 1,
                len: 1,
                expected: 2
            }
        );
    }

    #[test]
    fn empty_and_blank_are_rejected() {
        assert_eq!(
            KeyboardLayout::new(vec![], DVec2::splat(80.0), 0.0).unwrap_err(),
            LayoutError::Empty
        );
        let blank = vec![vec!["a".to_string(), " ".to_string()]];
        assert_eq!(
            KeyboardLayout::new(blank, DVec2::splat(80.0), 0.0).unwrap_err(),
            LayoutError::BlankTarget { row: 0, col: 1 }
        );
    }

    #[test]
    fn bad_header_is_rejected() {
        let rows = || vec![vec!["a".to_string()]];
        for h in [f64::NAN, f64::INFINITY, -1.0] {
            assert!(matches!(
                KeyboardLayout::new(rows(), DVec2::splat(80.0), h),
                Err(LayoutError::HeaderHeight(_))
            ));
        }
        assert!(KeyboardLayout::new(rows(), DVec2::splat(80.0), 0.0).is_ok());
    }

    #[test]
    fn targets_are_distinct() {
        let layout = calculator();
        let t = layout.targets();
        assert_eq!(t.len(), 19);
        assert_eq!(t.iter().filter(|id| **id == "key-0").count(), 1);
    }
}
