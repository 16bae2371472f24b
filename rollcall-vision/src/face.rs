use ndarray::Array1;

/// Detection result from YuNet, in source image pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: [f32; 4], // x, y, w, h
    pub score: f32,
    pub landmarks: [f32; 10], // 5 points: x1,y1,x2,y2,...,x5,y5
}

impl Detection {
    pub fn left_eye(&self) -> (f32, f32) {
        (self.landmarks[0], self.landmarks[1])
    }

    pub fn right_eye(&self) -> (f32, f32) {
        (self.landmarks[2], self.landmarks[3])
    }
}

/// Face embedding produced by the recognition model.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Array1<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            vector: Array1::from_vec(values),
        }
    }

    pub fn dim(&self) -> usize {
        self.vector.len()
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.vector.to_vec()
    }

    pub fn norm(&self) -> f32 {
        self.vector.dot(&self.vector).sqrt()
    }

    /// Scale to unit length. A zero vector is returned unchanged.
    pub fn l2_normalized(mut self) -> Self {
        let norm = self.norm();
        if norm > 0.0 {
            self.vector.mapv_inplace(|x| x / norm);
        }
        self
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// One face found in an image. Matching only looks at the embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceRecord {
    pub embedding: Embedding,
    pub detection: Option<Detection>,
}

impl FaceRecord {
    pub fn from_embedding(embedding: impl Into<Embedding>) -> Self {
        Self {
            embedding: embedding.into(),
            detection: None,
        }
    }
}

/// Greedy non-maximum suppression.
///
/// Output is ordered by descending score, so the first element is always the
/// most confident surviving detection. An `iou_threshold` of 1.0 or more
/// keeps every detection.
pub fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let overlaps = kept
            .iter()
            .any(|k| compute_iou(&k.bbox, &candidate.bbox) > iou_threshold);
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

fn compute_iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = (a[0] + a[2]).min(b[0] + b[2]);
    let y2 = (a[1] + a[3]).min(b[1] + b[3]);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let inter = (x2 - x1) * (y2 - y1);
    let union = a[2] * a[3] + b[2] * b[3] - inter;
    if union <= 0.0 {
        return 0.0;
    }
    inter / union
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(bbox: [f32; 4], score: f32) -> Detection {
        Detection {
            bbox,
            score,
            landmarks: [0.0; 10],
        }
    }

    #[test]
    fn test_iou() {
        let a = [10.0, 10.0, 20.0, 20.0];
        let b = [15.0, 15.0, 20.0, 20.0];
        let iou = compute_iou(&a, &b);
        assert!(iou > 0.0 && iou < 1.0);
        assert!((compute_iou(&a, &a) - 1.0).abs() < 1e-6);

        // No overlap
        let c = [100.0, 100.0, 10.0, 10.0];
        assert_eq!(compute_iou(&a, &c), 0.0);
    }

    #[test]
    fn test_nms_keeps_best_and_disjoint() {
        let detections = vec![
            det([12.0, 12.0, 20.0, 20.0], 0.8),
            det([100.0, 100.0, 20.0, 20.0], 0.85),
            det([10.0, 10.0, 20.0, 20.0], 0.9),
        ];

        let result = nms(detections, 0.3);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].score, 0.9);
        assert_eq!(result[1].score, 0.85);
    }

    #[test]
    fn test_nms_disabled_still_sorts() {
        let detections = vec![
            det([10.0, 10.0, 20.0, 20.0], 0.7),
            det([10.0, 10.0, 20.0, 20.0], 0.9),
        ];
        let result = nms(detections, 1.0);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].score, 0.9);
    }

    #[test]
    fn test_l2_normalized() {
        let e = Embedding::new(vec![3.0, 4.0]).l2_normalized();
        assert!((e.norm() - 1.0).abs() < 1e-6);
        assert!((e.vector[0] - 0.6).abs() < 1e-6);

        let zero = Embedding::new(vec![0.0, 0.0]).l2_normalized();
        assert_eq!(zero.to_vec(), vec![0.0, 0.0]);
    }
}
