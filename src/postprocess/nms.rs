use std::collections::BTreeMap;
use ndarray::ArrayView2;
use rayon::prelude::*;
use crate::common::{DetBox, Detection};
use crate::data::ClassThresholds;
use crate::error::PostprocessError;

pub trait Nms {
    fn iou(&self, other: &Self) -> f32;
    fn confidence(&self) -> f32;
    fn class_id(&self) -> usize;
}

/// Greedy suppression of a single group, in place.
///
/// Sorts by confidence descending (stable, so ties keep their input order), then keeps a box only
/// when its IoU with every box kept before it is `<= iou_threshold`.
pub fn suppress<T: Nms>(boxes: &mut Vec<T>, iou_threshold: f32) {
    boxes.sort_by(|b1, b2| b2.confidence().total_cmp(&b1.confidence()));
    let mut current_index = 0;
    for index in 0..boxes.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = boxes[prev_index].iou(&boxes[index]);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            boxes.swap(current_index, index);
            current_index += 1;
        }
    }
    boxes.truncate(current_index);
}

/// Non-max suppression over candidates of any class.
///
/// Class-agnostic mode suppresses across the whole set. Class-aware mode partitions by class,
/// suppresses each partition independently (in parallel) and concatenates the survivors by
/// ascending class index. Within each group the output is ordered by descending score.
pub fn nms<T: Nms + Clone + Send>(candidates: &[T], iou_threshold: f32, class_agnostic: bool) -> Vec<T> {
    if class_agnostic {
        let mut kept = candidates.to_vec();
        suppress(&mut kept, iou_threshold);
        return kept;
    }

    let mut groups: BTreeMap<usize, Vec<T>> = BTreeMap::new();
    for candidate in candidates {
        groups.entry(candidate.class_id()).or_default().push(candidate.clone());
    }

    groups
        .into_iter()
        .map(|(_, group)| group)
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|mut group| {
            suppress(&mut group, iou_threshold);
            group
        })
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}

/// Multiclass NMS over a `(K, 4)` corner box array and a `(K, C)` score array.
///
/// Class-aware mode treats every `(box, class)` pair whose score passes its class threshold as a
/// candidate. Class-agnostic mode assigns each box its best-scoring class (the lowest index on a
/// tie) and suppresses across classes.
pub fn multiclass_nms(
    boxes: ArrayView2<f32>,
    scores: ArrayView2<f32>,
    iou_threshold: f32,
    thresholds: &ClassThresholds,
    class_agnostic: bool,
) -> Result<Vec<Detection>, PostprocessError> {
    if boxes.ncols() != 4 {
        return Err(PostprocessError::InvalidShape { expected: 4, actual: boxes.ncols() });
    }
    if boxes.nrows() != scores.nrows() {
        return Err(PostprocessError::ShapeMismatch {
            reference: boxes.shape().to_vec(),
            candidate: scores.shape().to_vec(),
        });
    }

    let to_box = |i: usize| DetBox::new(boxes[[i, 0]], boxes[[i, 1]], boxes[[i, 2]], boxes[[i, 3]]);

    let candidates: Vec<Detection> = if class_agnostic {
        scores
            .outer_iter()
            .enumerate()
            .filter_map(|(i, row)| {
                let (class_id, &score) = row
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))?;
                thresholds
                    .passes(class_id, score)
                    .then(|| Detection::new(class_id, to_box(i), score).with_anchor(i))
            })
            .collect()
    } else {
        (0..scores.ncols())
            .flat_map(|c| {
                scores
                    .column(c)
                    .iter()
                    .enumerate()
                    .filter(|&(_, &s)| thresholds.passes(c, s))
                    .map(|(i, &s)| Detection::new(c, to_box(i), s).with_anchor(i))
                    .collect::<Vec<_>>()
            })
            .collect()
    };

    Ok(nms(&candidates, iou_threshold, class_agnostic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn det(x1: f32, y1: f32, x2: f32, y2: f32, score: f32, class_id: usize) -> Detection {
        Detection::new(class_id, DetBox::new(x1, y1, x2, y2), score)
    }

    #[test]
    fn empty_input() {
        let kept: Vec<Detection> = nms(&[], 0.5, false);
        assert!(kept.is_empty());
        let kept: Vec<Detection> = nms(&[], 0.5, true);
        assert!(kept.is_empty());
    }

    #[test]
    fn single_candidate_is_kept() {
        let c = vec![det(0., 0., 10., 10., 0.4, 1)];
        assert_eq!(nms(&c, 0.5, false), c);
    }

    #[test]
    fn overlapping_same_class_suppressed() {
        let c = vec![
            det(0., 0., 10., 10., 0.9, 0),
            det(1., 1., 11., 11., 0.8, 0),
            det(50., 50., 60., 60., 0.7, 0),
        ];
        let kept = nms(&c, 0.5, false);
        assert_eq!(kept, vec![c[0].clone(), c[2].clone()]);
    }

    #[test]
    fn different_classes_not_suppressed_unless_agnostic() {
        let c = vec![det(0., 0., 10., 10., 0.9, 0), det(1., 1., 11., 11., 0.8, 1)];
        assert_eq!(nms(&c, 0.5, false).len(), 2);
        let agnostic = nms(&c, 0.5, true);
        assert_eq!(agnostic, vec![c[0].clone()]);
    }

    #[test]
    fn ties_keep_input_order() {
        let c = vec![
            det(0., 0., 10., 10., 0.5, 0).with_anchor(7),
            det(0., 0., 10., 10., 0.5, 0).with_anchor(3),
        ];
        let kept = nms(&c, 0.5, false);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].anchor, 7);
    }

    #[test]
    fn output_grouped_by_ascending_class() {
        let c = vec![
            det(0., 0., 10., 10., 0.2, 1),
            det(100., 100., 110., 110., 0.9, 1),
            det(50., 50., 60., 60., 0.6, 0),
        ];
        let kept = nms(&c, 0.5, false);
        let order: Vec<(usize, f32)> = kept.iter().map(|d| (d.class_id, d.score)).collect();
        assert_eq!(order, vec![(0, 0.6), (1, 0.9), (1, 0.2)]);
    }

    #[test]
    fn iou_equal_to_threshold_is_kept() {
        // IoU of these two boxes is exactly 0.5.
        let c = vec![det(0., 0., 10., 10., 0.9, 0), det(0., 0., 10., 5., 0.8, 0)];
        assert_eq!(nms(&c, 0.5, false).len(), 2);
    }

    #[test]
    fn multiclass_nms_class_aware() {
        let boxes = array![[0., 0., 10., 10.], [1., 1., 11., 11.], [50., 50., 60., 60.]];
        let scores = array![[0.9, 0.0], [0.0, 0.8], [0.1, 0.7]];
        let kept = multiclass_nms(boxes.view(), scores.view(), 0.45, &ClassThresholds::new(0.3), false).unwrap();
        let got: Vec<(usize, usize)> = kept.iter().map(|d| (d.class_id, d.anchor)).collect();
        assert_eq!(got, vec![(0, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn multiclass_nms_agnostic_uses_best_class() {
        let boxes = array![[0., 0., 10., 10.], [1., 1., 11., 11.]];
        let scores = array![[0.9, 0.1], [0.2, 0.8]];
        let kept = multiclass_nms(boxes.view(), scores.view(), 0.45, &ClassThresholds::new(0.3), true).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].class_id, 0);
    }

    #[test]
    fn multiclass_nms_agnostic_tie_takes_first_class() {
        let boxes = array![[0., 0., 10., 10.]];
        let scores = array![[0.6, 0.6]];
        let kept = multiclass_nms(boxes.view(), scores.view(), 0.45, &ClassThresholds::new(0.3), true).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].class_id, 0);
    }

    #[test]
    fn multiclass_nms_rejects_bad_shapes() {
        let boxes = array![[0., 0., 10.]];
        let scores = array![[0.9, 0.1]];
        assert!(matches!(
            multiclass_nms(boxes.view(), scores.view(), 0.45, &ClassThresholds::new(0.3), false),
            Err(PostprocessError::InvalidShape { expected: 4, actual: 3 })
        ));
    }
}
