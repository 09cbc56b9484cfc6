//! Parameter grids and the points they expand into.
//!
//! A grid is either the row-major cross-product of named axes (the last axis
//! varies fastest) or an explicit list of coordinate tuples. Point ordering is
//! a pure function of the grid definition, so repeated sweeps over the same
//! grid always visit points in the same order.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SweepError};

// ============================================================================
// Axis
// ============================================================================

/// One named, ordered sequence of parameter values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub name: String,
    pub values: Vec<f64>,
}

impl Axis {
    pub fn new(name: impl Into<String>, values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().collect(),
        }
    }

    /// `count` evenly spaced values from `start` to `stop` inclusive.
    pub fn linspace(name: impl Into<String>, start: f64, stop: f64, count: usize) -> Self {
        let values = match count {
            0 => Vec::new(),
            1 => vec![start],
            _ => {
                let step = (stop - start) / (count - 1) as f64;
                (0..count).map(|i| start + step * i as f64).collect()
            }
        };
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ============================================================================
// Parameter Grid
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Layout {
    Product(Vec<Vec<f64>>),
    Explicit(Vec<Vec<f64>>),
}

/// The set of evaluation points of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterGrid {
    names: Arc<[String]>,
    layout: Layout,
}

impl ParameterGrid {
    /// Cross-product of one or more axes.
    pub fn product(axes: impl IntoIterator<Item = Axis>) -> Result<Self> {
        let (names, values): (Vec<String>, Vec<Vec<f64>>) =
            axes.into_iter().map(|axis| (axis.name, axis.values)).unzip();
        validate_names(&names)?;

        Ok(Self {
            names: names.into(),
            layout: Layout::Product(values),
        })
    }

    /// Explicit list of coordinate tuples, one value per name. The grid is
    /// one-dimensional with shape `[points.len()]`.
    pub fn explicit<S: Into<String>>(
        names: impl IntoIterator<Item = S>,
        points: Vec<Vec<f64>>,
    ) -> Result<Self> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        validate_names(&names)?;

        if let Some((i, point)) = points
            .iter()
            .enumerate()
            .find(|(_, point)| point.len() != names.len())
        {
            return Err(SweepError::config(format!(
                "point {i} has {} coordinates but the grid has {} parameters",
                point.len(),
                names.len()
            )));
        }

        Ok(Self {
            names: names.into(),
            layout: Layout::Explicit(points),
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Extent of each grid dimension.
    pub fn shape(&self) -> Vec<usize> {
        match &self.layout {
            Layout::Product(axes) => axes.iter().map(Vec::len).collect(),
            Layout::Explicit(points) => vec![points.len()],
        }
    }

    /// Total number of evaluation points.
    pub fn len(&self) -> usize {
        match &self.layout {
            Layout::Product(axes) => axes.iter().map(Vec::len).product(),
            Layout::Explicit(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert a flat row-major index into per-dimension indices.
    pub fn unravel(&self, index: usize) -> Vec<usize> {
        match &self.layout {
            Layout::Product(axes) => unravel(index, axes.iter().map(Vec::len)),
            Layout::Explicit(_) => vec![index],
        }
    }

    /// The point at flat index `index`, or `None` past the end.
    pub fn point(&self, index: usize) -> Option<GridPoint> {
        if index >= self.len() {
            return None;
        }

        let multi_index = self.unravel(index);
        let values = match &self.layout {
            Layout::Product(axes) => axes
                .iter()
                .zip(&multi_index)
                .map(|(axis, &i)| axis[i])
                .collect(),
            Layout::Explicit(points) => points[index].clone(),
        };

        Some(GridPoint {
            index,
            multi_index,
            names: Arc::clone(&self.names),
            values,
        })
    }

    /// All points in row-major order.
    pub fn points(&self) -> impl Iterator<Item = GridPoint> + '_ {
        (0..self.len()).filter_map(move |i| self.point(i))
    }
}

fn validate_names(names: &[String]) -> Result<()> {
    if names.is_empty() {
        return Err(SweepError::config("a parameter grid needs at least one axis"));
    }

    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if name.trim().is_empty() {
            return Err(SweepError::config("parameter names must not be empty"));
        }
        if !seen.insert(name.as_str()) {
            return Err(SweepError::config(format!(
                "parameter '{name}' appears more than once"
            )));
        }
    }
    Ok(())
}

/// Row-major unravel; the last dimension varies fastest.
pub(crate) fn unravel(
    index: usize,
    shape: impl DoubleEndedIterator<Item = usize> + ExactSizeIterator,
) -> Vec<usize> {
    let mut multi_index = vec![0; shape.len()];
    let mut remainder = index;
    for (slot, extent) in multi_index.iter_mut().rev().zip(shape.rev()) {
        if extent > 0 {
            *slot = remainder % extent;
            remainder /= extent;
        }
    }
    multi_index
}

// ============================================================================
// Grid Point
// ============================================================================

/// Coordinates of one evaluation point together with its position in the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    index: usize,
    multi_index: Vec<usize>,
    names: Arc<[String]>,
    values: Vec<f64>,
}

impl GridPoint {
    /// Flat row-major index.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn multi_index(&self) -> &[usize] {
        &self.multi_index
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value of the named parameter at this point.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    /// (name, value) pairs in axis order.
    pub fn coordinates(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

impl fmt::Display for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indices: Vec<String> = self.multi_index.iter().map(ToString::to_string).collect();
        let coords: Vec<String> = self
            .coordinates()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        write!(f, "({}) [{}]", indices.join(", "), coords.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flux_ng_grid() -> ParameterGrid {
        ParameterGrid::product(vec![
            Axis::new("flux", vec![0.0, 0.1, 0.2]),
            Axis::new("ng", vec![0.0, 0.5]),
        ])
        .unwrap()
    }

    #[test]
    fn test_product_shape_and_len() {
        let grid = flux_ng_grid();
        assert_eq!(grid.shape(), vec![3, 2]);
        assert_eq!(grid.len(), 6);
        assert!(!grid.is_empty());
        assert_eq!(grid.names(), &["flux".to_string(), "ng".to_string()]);
    }

    #[test]
    fn test_row_major_order() {
        let grid = flux_ng_grid();
        let order: Vec<(Vec<usize>, Vec<f64>)> = grid
            .points()
            .map(|p| (p.multi_index().to_vec(), p.values().to_vec()))
            .collect();

        assert_eq!(
            order,
            vec![
                (vec![0, 0], vec![0.0, 0.0]),
                (vec![0, 1], vec![0.0, 0.5]),
                (vec![1, 0], vec![0.1, 0.0]),
                (vec![1, 1], vec![0.1, 0.5]),
                (vec![2, 0], vec![0.2, 0.0]),
                (vec![2, 1], vec![0.2, 0.5]),
            ]
        );
    }

    #[test]
    fn test_order_is_stable() {
        let first: Vec<GridPoint> = flux_ng_grid().points().collect();
        let second: Vec<GridPoint> = flux_ng_grid().points().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_point_lookup() {
        let grid = flux_ng_grid();
        let point = grid.point(3).unwrap();
        assert_eq!(point.index(), 3);
        assert_eq!(point.get("flux"), Some(0.1));
        assert_eq!(point.get("ng"), Some(0.5));
        assert_eq!(point.get("phi"), None);
        assert_eq!(point.to_string(), "(1, 1) [flux=0.1, ng=0.5]");
        assert!(grid.point(6).is_none());
    }

    #[test]
    fn test_empty_axis_gives_empty_grid() {
        let grid = ParameterGrid::product(vec![
            Axis::new("flux", vec![0.0, 0.1]),
            Axis::new("ng", Vec::new()),
        ])
        .unwrap();
        assert_eq!(grid.shape(), vec![2, 0]);
        assert!(grid.is_empty());
        assert_eq!(grid.points().count(), 0);
    }

    #[test]
    fn test_explicit_points() {
        let grid = ParameterGrid::explicit(
            ["EJ", "EC"],
            vec![vec![20.0, 0.3], vec![25.0, 0.2], vec![30.0, 0.1]],
        )
        .unwrap();

        assert_eq!(grid.shape(), vec![3]);
        let point = grid.point(2).unwrap();
        assert_eq!(point.multi_index(), &[2]);
        assert_eq!(point.get("EC"), Some(0.1));
    }

    #[test]
    fn test_explicit_rejects_ragged_points() {
        let err = ParameterGrid::explicit(["EJ", "EC"], vec![vec![20.0, 0.3], vec![25.0]])
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("point 1"));
    }

    #[test]
    fn test_invalid_names() {
        assert!(ParameterGrid::product(Vec::new()).unwrap_err().is_configuration());
        assert!(
            ParameterGrid::product(vec![Axis::new("", vec![1.0])])
                .unwrap_err()
                .is_configuration()
        );
        let err = ParameterGrid::product(vec![
            Axis::new("flux", vec![1.0]),
            Axis::new("flux", vec![2.0]),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_linspace() {
        let axis = Axis::linspace("flux", 0.0, 1.0, 5);
        assert_eq!(axis.values, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(Axis::linspace("x", 2.0, 3.0, 1).values, vec![2.0]);
        assert!(Axis::linspace("x", 2.0, 3.0, 0).is_empty());
    }

    #[test]
    fn test_unravel_three_dimensions() {
        assert_eq!(unravel(0, [2usize, 3, 4].into_iter()), vec![0, 0, 0]);
        assert_eq!(unravel(5, [2usize, 3, 4].into_iter()), vec![0, 1, 1]);
        assert_eq!(unravel(23, [2usize, 3, 4].into_iter()), vec![1, 2, 3]);
    }
}
