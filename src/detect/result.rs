/// Object detected in a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// `[x1, y1, x2, y2]` in frame pixel coordinates.
    pub bbox: [f32; 4],
    pub confidence: f32,
    pub class: ObjectClass,
}

impl Detection {
    pub fn new(bbox: [f32; 4], confidence: f32, class: ObjectClass) -> Self {
        Self {
            bbox,
            confidence,
            class,
        }
    }

    pub fn area(&self) -> f32 {
        (self.bbox[2] - self.bbox[0]).max(0.0) * (self.bbox[3] - self.bbox[1]).max(0.0)
    }

    pub fn iou(&self, other: &Detection) -> f32 {
        let x1 = self.bbox[0].max(other.bbox[0]);
        let y1 = self.bbox[1].max(other.bbox[1]);
        let x2 = self.bbox[2].min(other.bbox[2]);
        let y2 = self.bbox[3].min(other.bbox[3]);
        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    Car,
    Motorcycle,
    Bus,
    Truck,
    Person,
    Other(u16),
}

impl ObjectClass {
    /// Map a COCO class index.
    pub fn from_coco(id: usize) -> Self {
        match id {
            0 => ObjectClass::Person,
            2 => ObjectClass::Car,
            3 => ObjectClass::Motorcycle,
            5 => ObjectClass::Bus,
            7 => ObjectClass::Truck,
            other => ObjectClass::Other(other.min(u16::MAX as usize) as u16),
        }
    }

    pub fn is_vehicle(self) -> bool {
        matches!(
            self,
            ObjectClass::Car | ObjectClass::Motorcycle | ObjectClass::Bus | ObjectClass::Truck
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ObjectClass::Car => "car",
            ObjectClass::Motorcycle => "motorcycle",
            ObjectClass::Bus => "bus",
            ObjectClass::Truck => "truck",
            ObjectClass::Person => "person",
            ObjectClass::Other(_) => "other",
        }
    }
}

/// Greedy non-maximum suppression, highest confidence first.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut keep: Vec<Detection> = Vec::with_capacity(detections.len());
    for det in detections {
        if keep
            .iter()
            .all(|kept| kept.class != det.class || kept.iou(&det) < iou_threshold)
        {
            keep.push(det);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coco_vehicle_ids() {
        for id in [2, 3, 5, 7] {
            assert!(ObjectClass::from_coco(id).is_vehicle());
        }
        assert!(!ObjectClass::from_coco(0).is_vehicle());
        assert_eq!(ObjectClass::from_coco(9), ObjectClass::Other(9));
    }

    #[test]
    fn nms_keeps_best_of_overlapping_pair() {
        let a = Detection::new([0.0, 0.0, 10.0, 10.0], 0.9, ObjectClass::Car);
        let b = Detection::new([1.0, 1.0, 11.0, 11.0], 0.6, ObjectClass::Car);
        let c = Detection::new([50.0, 50.0, 60.0, 60.0], 0.7, ObjectClass::Car);
        let kept = non_max_suppression(vec![b, a.clone(), c.clone()], 0.45);
        assert_eq!(kept, vec![a, c]);
    }
}
