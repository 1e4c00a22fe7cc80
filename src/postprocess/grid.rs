use ndarray::{Array2, Axis};
use crate::error::PostprocessError;

/// Number of anchors a raw head produces for the given input size and strides.
/// A zero stride contributes no anchors.
pub fn anchor_count(input_width: u32, input_height: u32, strides: &[u32]) -> usize {
    strides
        .iter()
        .filter(|&&s| s > 0)
        .map(|&s| ((input_height / s) * (input_width / s)) as usize)
        .sum()
}

/// Decodes raw head rows in place into pixel-space `cx, cy, w, h`.
///
/// Anchors are laid out stride by stride, each stride row-major over its `(H/s) x (W/s)` grid.
/// `cx = (tx + gx) * s`, `cy = (ty + gy) * s`, `w = exp(tw) * s`, `h = exp(th) * s`.
/// Objectness and class columns are untouched.
pub fn grid_decode(
    tensor: &mut Array2<f32>,
    input_width: u32,
    input_height: u32,
    strides: &[u32],
) -> Result<(), PostprocessError> {
    if strides.is_empty() || strides.contains(&0) {
        return Err(PostprocessError::InvalidConfig(format!("invalid head strides {:?}", strides)));
    }
    let expected = anchor_count(input_width, input_height, strides);
    if tensor.nrows() != expected {
        return Err(PostprocessError::AnchorCountMismatch {
            expected,
            actual: tensor.nrows(),
        });
    }

    let mut rows = tensor.axis_iter_mut(Axis(0));
    for &stride in strides {
        let wsize = (input_width / stride) as usize;
        let hsize = (input_height / stride) as usize;
        let s = stride as f32;
        for k in 0..wsize * hsize {
            // Row count was checked above.
            let Some(mut row) = rows.next() else {
                break;
            };
            let gx = (k % wsize) as f32;
            let gy = (k / wsize) as f32;
            row[0] = (row[0] + gx) * s;
            row[1] = (row[1] + gy) * s;
            row[2] = row[2].exp() * s;
            row[3] = row[3].exp() * s;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yolox_640_has_8400_anchors() {
        assert_eq!(anchor_count(640, 640, &[8, 16, 32]), 8400);
        assert_eq!(anchor_count(416, 416, &[8, 16, 32]), 3549);
    }

    #[test]
    fn decodes_cells_per_stride() {
        // 64x32 input: stride 16 gives a 4x2 grid, stride 32 a 2x1 grid.
        let strides = [16, 32];
        let n = anchor_count(64, 32, &strides);
        assert_eq!(n, 10);
        let mut t = Array2::<f32>::zeros((n, 7));
        t[[0, 4]] = 0.9;
        grid_decode(&mut t, 64, 32, &strides).unwrap();

        // First anchor: cell (0, 0) stride 16, exp(0) = 1.
        assert_eq!((t[[0, 0]], t[[0, 1]], t[[0, 2]], t[[0, 3]]), (0., 0., 16., 16.));
        assert_eq!(t[[0, 4]], 0.9);
        // Sixth anchor: cell (1, 1) of the stride 16 grid.
        assert_eq!((t[[5, 0]], t[[5, 1]]), (16., 16.));
        // Ninth anchor: first cell of the stride 32 grid.
        assert_eq!((t[[8, 0]], t[[8, 1]], t[[8, 2]]), (0., 0., 32.));
        assert_eq!(t[[9, 0]], 32.);
    }

    #[test]
    fn rejects_zero_stride() {
        assert_eq!(anchor_count(64, 64, &[32, 0]), 4);
        let mut t = Array2::<f32>::zeros((4, 7));
        assert!(matches!(
            grid_decode(&mut t, 64, 64, &[32, 0]),
            Err(PostprocessError::InvalidConfig(_))
        ));
        assert!(matches!(
            grid_decode(&mut t, 64, 64, &[]),
            Err(PostprocessError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_wrong_anchor_count() {
        let mut t = Array2::<f32>::zeros((5, 7));
        assert_eq!(
            grid_decode(&mut t, 640, 640, &[8, 16, 32]),
            Err(PostprocessError::AnchorCountMismatch { expected: 8400, actual: 5 })
        );
    }
}
