//! [`PointExtractor`] backed by the `calib-targets` chessboard detector.
//!
//! ChESS corners -> grid graph -> labelled chessboard, then reordered into
//! model-point order. Only complete boards are accepted.

use crate::collaborators::PointExtractor;
use crate::grid::{order_board_corners, GridCorner};
use calib_jobs_core::BoardSize;
use calib_targets::chessboard::{ChessboardDetector, ChessboardParams};
use calib_targets::detect;
use image::GrayImage;
use nalgebra::Point2;

/// Chessboard detection via ChESS corners and grid-graph labelling.
///
/// ChESS corners carry sub-pixel positions already, so refinement keeps the
/// trait's identity default.
#[derive(Clone, Debug, Default)]
pub struct ChessboardExtractor {
    params: ChessboardParams,
}

impl ChessboardExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from custom detector parameters. The expected grid size and
    /// completeness are always overridden per job.
    pub fn with_params(params: ChessboardParams) -> Self {
        Self { params }
    }

    fn params_for(&self, board: BoardSize) -> ChessboardParams {
        ChessboardParams {
            expected_rows: Some(board.height),
            expected_cols: Some(board.width),
            completeness_threshold: 1.0,
            ..self.params.clone()
        }
    }
}

impl PointExtractor for ChessboardExtractor {
    fn detect_corners(&self, image: &GrayImage, board: BoardSize) -> Option<Vec<Point2<f32>>> {
        let corners = detect::detect_corners_default(image);
        let detector = ChessboardDetector::new(self.params_for(board));
        let found = detector.detect_from_corners(&corners)?;

        let labelled: Vec<GridCorner> = found
            .detection
            .corners
            .iter()
            .filter_map(|c| {
                c.grid.as_ref().map(|g| GridCorner {
                    i: g.i,
                    j: g.j,
                    position: c.position,
                })
            })
            .collect();
        log::debug!(
            "chessboard: {} raw corners, {} labelled",
            corners.len(),
            labelled.len()
        );
        order_board_corners(&labelled, board)
    }
}
