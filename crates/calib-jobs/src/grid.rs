//! Turning grid-labelled corner detections into model-point order.

use calib_jobs_core::BoardSize;
use nalgebra::Point2;

/// A detected corner with integer grid coordinates `(i, j)`.
///
/// The labelling origin is arbitrary; only relative coordinates matter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridCorner {
    pub i: i32,
    pub j: i32,
    pub position: Point2<f32>,
}

/// Order a complete grid detection row-major (`x` fastest) for `board`.
///
/// `i` is taken as the board's x axis; a grid spanning `height × width`
/// instead is accepted and transposed. Returns `None` unless every one of
/// the `board.corner_count()` positions is labelled exactly once.
pub fn order_board_corners(corners: &[GridCorner], board: BoardSize) -> Option<Vec<Point2<f32>>> {
    let count = board.corner_count();
    if count == 0 || corners.len() != count {
        return None;
    }

    let i0 = corners.iter().map(|c| c.i).min()?;
    let j0 = corners.iter().map(|c| c.j).min()?;
    let span_i = corners.iter().map(|c| c.i).max()? as i64 - i0 as i64 + 1;
    let span_j = corners.iter().map(|c| c.j).max()? as i64 - j0 as i64 + 1;

    let (w, h) = (board.width as i64, board.height as i64);
    let transposed = if (span_i, span_j) == (w, h) {
        false
    } else if (span_i, span_j) == (h, w) {
        true
    } else {
        return None;
    };

    let width = board.width as usize;
    let mut slots: Vec<Option<Point2<f32>>> = vec![None; count];
    for c in corners {
        let di = (c.i as i64 - i0 as i64) as usize;
        let dj = (c.j as i64 - j0 as i64) as usize;
        let (x, y) = if transposed { (dj, di) } else { (di, dj) };
        let slot = &mut slots[y * width + x];
        if slot.is_some() {
            return None;
        }
        *slot = Some(c.position);
    }
    slots.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled(w: i32, h: i32, offset: (i32, i32)) -> Vec<GridCorner> {
        // Shuffled-ish order: columns outer, rows inner.
        (0..w)
            .flat_map(|i| {
                (0..h).map(move |j| GridCorner {
                    i: i + offset.0,
                    j: j + offset.1,
                    position: Point2::new(10.0 * i as f32, 20.0 * j as f32),
                })
            })
            .collect()
    }

    #[test]
    fn orders_row_major_regardless_of_origin() {
        let corners = labelled(3, 2, (-5, 7));
        let ordered = order_board_corners(&corners, BoardSize::new(3, 2)).expect("complete");
        let xs: Vec<(f32, f32)> = ordered.iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(
            xs,
            vec![
                (0.0, 0.0),
                (10.0, 0.0),
                (20.0, 0.0),
                (0.0, 20.0),
                (10.0, 20.0),
                (20.0, 20.0)
            ]
        );
    }

    #[test]
    fn accepts_transposed_labelling() {
        // Grid labelled 2 wide, 3 tall for a 3x2 board.
        let corners = labelled(2, 3, (0, 0));
        let ordered = order_board_corners(&corners, BoardSize::new(3, 2)).expect("complete");
        assert_eq!(ordered.len(), 6);
        // Board x runs along grid j.
        assert_eq!((ordered[1].x, ordered[1].y), (0.0, 20.0));
        assert_eq!((ordered[3].x, ordered[3].y), (10.0, 0.0));
    }

    #[test]
    fn rejects_partial_or_duplicate_labelling() {
        let board = BoardSize::new(3, 2);
        let mut corners = labelled(3, 2, (0, 0));
        corners.pop();
        assert!(order_board_corners(&corners, board).is_none());

        let mut corners = labelled(3, 2, (0, 0));
        corners[5] = corners[0];
        assert!(order_board_corners(&corners, board).is_none());

        let corners = labelled(6, 1, (0, 0));
        assert!(order_board_corners(&corners, board).is_none());
    }
}
