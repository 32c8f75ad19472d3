//! Checkerboard geometry, convergence criteria and the model point set.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Number of *inner* corners along each axis of a checkerboard.
///
/// `width` counts corners along a row (image x), `height` counts rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardSize {
    pub width: u32,
    pub height: u32,
}

impl BoardSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of inner corners, `width * height`.
    #[inline]
    pub fn corner_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Same board seen with its axes swapped.
    #[inline]
    pub fn transposed(&self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

impl std::fmt::Display for BoardSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Termination criteria for iterative sub-pixel corner refinement.
///
/// Refinement stops once a step moves a corner by less than `epsilon`
/// pixels or after `max_iterations` steps, whichever comes first.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TermCriteria {
    pub epsilon: f64,
    pub max_iterations: u32,
}

impl TermCriteria {
    pub const DEFAULT_EPSILON: f64 = 0.001;
    pub const DEFAULT_MAX_ITERATIONS: u32 = 30;
}

impl Default for TermCriteria {
    fn default() -> Self {
        Self {
            epsilon: Self::DEFAULT_EPSILON,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Sub-pixel refinement request handed to a point extractor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RefineParams {
    /// Half side of the square search window, in pixels. A value of 11
    /// searches a 23×23 neighbourhood around each corner.
    pub half_window: u32,
    pub criteria: TermCriteria,
}

/// Pixel dimensions of a decoded image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Physical board corners in the board frame: a unit-spaced grid on `Z = 0`.
///
/// Points are stored row-major, x varying fastest:
/// `(0,0,0), (1,0,0), .., (w-1,0,0), (0,1,0), ..`. The set is built once per
/// job and shared by every correspondence through a reference-counted slice.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelPoints {
    board: BoardSize,
    points: Arc<[Point3<f32>]>,
}

impl ModelPoints {
    pub fn new(board: BoardSize) -> Self {
        let points: Vec<Point3<f32>> = (0..board.height)
            .flat_map(|y| (0..board.width).map(move |x| Point3::new(x as f32, y as f32, 0.0)))
            .collect();
        Self {
            board,
            points: points.into(),
        }
    }

    #[inline]
    pub fn board(&self) -> BoardSize {
        self.board
    }

    #[inline]
    pub fn points(&self) -> &[Point3<f32>] {
        &self.points
    }

    /// Shared handle to the point slice, cloned into each correspondence.
    #[inline]
    pub fn shared(&self) -> Arc<[Point3<f32>]> {
        Arc::clone(&self.points)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
