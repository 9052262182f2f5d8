use glam::Vec2;
use serde::{Deserialize, Serialize};

/// An axis-aligned box in image coordinates (origin top-left, y grows downward).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bbox {
    /// Top-left corner.
    pub min: Vec2,
    /// Bottom-right corner.
    pub max: Vec2,
}

impl Bbox {
    /// Creates a box from its top-left and bottom-right corners.
    ///
    /// # Example
    /// ```
    /// use glam::Vec2;
    /// use htr_core::analysis::bbox::Bbox;
    /// let bbox = Bbox::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 5.0));
    /// assert_eq!(bbox.width(), 10.0);
    /// ```
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn from_xyxy(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self::new(Vec2::new(xmin, ymin), Vec2::new(xmax, ymax))
    }

    pub fn width(&self) -> f32 {
        (self.max.x - self.min.x).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.max.y - self.min.y).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) / 2.0
    }

    /// A box without positive area in either dimension.
    pub fn is_empty(&self) -> bool {
        self.max.x <= self.min.x || self.max.y <= self.min.y
    }

    /// Overlapping area of two boxes, 0.0 when they do not overlap.
    pub fn intersection(&self, other: &Self) -> f32 {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);

        if max.x > min.x && max.y > min.y {
            (max.x - min.x) * (max.y - min.y)
        } else {
            0.
        }
    }

    /// Jaccard index of the two boxes.
    ///
    /// # Example
    /// ```
    /// use glam::Vec2;
    /// use htr_core::analysis::bbox::Bbox;
    /// let a = Bbox::from_xyxy(0.0, 0.0, 4.0, 2.0);
    /// let b = Bbox::from_xyxy(2.0, 0.0, 6.0, 2.0);
    /// assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    /// ```
    pub fn iou(&self, other: &Self) -> f32 {
        let intersection_area = self.intersection(other);
        let union_area = self.area() + other.area() - intersection_area;

        if union_area > 0.0 {
            intersection_area / union_area
        } else {
            0.0
        }
    }

    /// Jaccard index of the vertical extents only.
    ///
    /// Two words on the same text line share most of their y-range even when
    /// they are far apart horizontally.
    pub fn vertical_iou(&self, other: &Self) -> f32 {
        let overlap = (self.max.y.min(other.max.y) - self.min.y.max(other.min.y)).max(0.0);
        let union = self.height() + other.height() - overlap;

        if union > 0.0 { overlap / union } else { 0.0 }
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn clamp(&self, min_bounds: Vec2, max_bounds: Vec2) -> Self {
        Self {
            min: self.min.clamp(min_bounds, max_bounds),
            max: self.max.clamp(min_bounds, max_bounds),
        }
    }

    pub fn scale(&self, factor: f32) -> Self {
        Self {
            min: self.min * factor,
            max: self.max * factor,
        }
    }

    pub fn translate(&self, offset: Vec2) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Grows the box by `margin` pixels on every side.
    pub fn enlarge(&self, margin: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(margin),
            max: self.max + Vec2::splat(margin),
        }
    }

    /// Integer pixel rectangle `(x, y, width, height)` covered by the box.
    pub fn to_pixel_rect(&self) -> (u32, u32, u32, u32) {
        let x = self.min.x.max(0.0).floor() as u32;
        let y = self.min.y.max(0.0).floor() as u32;
        let width = (self.max.x.ceil() - x as f32).max(0.0) as u32;
        let height = (self.max.y.ceil() - y as f32).max(0.0) as u32;

        (x, y, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_dimensions() {
        let bbox = Bbox::from_xyxy(10.0, 20.0, 14.0, 26.0);
        assert_eq!(bbox.width(), 4.0);
        assert_eq!(bbox.height(), 6.0);
        assert_eq!(bbox.area(), 24.0);
        assert_eq!(bbox.center(), Vec2::new(12.0, 23.0));

        // inverted boxes have no area
        let inverted = Bbox::from_xyxy(5.0, 5.0, 1.0, 1.0);
        assert_eq!(inverted.area(), 0.0);
        assert!(inverted.is_empty());
    }

    #[test]
    fn test_bbox_iou() {
        let a = Bbox::from_xyxy(0.0, 0.0, 4.0, 4.0);
        assert_eq!(a.iou(&a), 1.0);

        // 2x2 overlap of two 4x4 boxes: 4 / 28
        let b = Bbox::from_xyxy(2.0, 2.0, 6.0, 6.0);
        assert!((a.iou(&b) - 4.0 / 28.0).abs() < 1e-6);
        assert_eq!(a.iou(&b), b.iou(&a));

        let far = Bbox::from_xyxy(10.0, 10.0, 12.0, 12.0);
        assert_eq!(a.iou(&far), 0.0);

        // touching edges do not overlap
        let right = Bbox::from_xyxy(4.0, 0.0, 8.0, 4.0);
        assert_eq!(a.iou(&right), 0.0);

        let line = Bbox::from_xyxy(0.0, 0.0, 5.0, 0.0);
        assert_eq!(line.iou(&line), 0.0);
    }

    #[test]
    fn test_bbox_vertical_iou() {
        // same row, far apart horizontally
        let left = Bbox::from_xyxy(0.0, 10.0, 20.0, 30.0);
        let right = Bbox::from_xyxy(500.0, 10.0, 520.0, 30.0);
        assert_eq!(left.vertical_iou(&right), 1.0);
        assert_eq!(left.iou(&right), 0.0);

        // half shifted: overlap 10, union 30
        let shifted = Bbox::from_xyxy(0.0, 20.0, 20.0, 40.0);
        assert!((left.vertical_iou(&shifted) - 10.0 / 30.0).abs() < 1e-6);

        let below = Bbox::from_xyxy(0.0, 50.0, 20.0, 70.0);
        assert_eq!(left.vertical_iou(&below), 0.0);
    }

    #[test]
    fn test_bbox_transformations() {
        let bbox = Bbox::from_xyxy(10.0, 10.0, 20.0, 30.0);

        let enlarged = bbox.enlarge(5.0);
        assert_eq!(enlarged, Bbox::from_xyxy(5.0, 5.0, 25.0, 35.0));

        let scaled = bbox.scale(0.5);
        assert_eq!(scaled, Bbox::from_xyxy(5.0, 5.0, 10.0, 15.0));

        let moved = bbox.translate(Vec2::new(-10.0, 5.0));
        assert_eq!(moved, Bbox::from_xyxy(0.0, 15.0, 10.0, 35.0));

        let clamped = Bbox::from_xyxy(-10.0, -5.0, 1030.0, 50.0)
            .clamp(Vec2::ZERO, Vec2::new(1024.0, 768.0));
        assert_eq!(clamped, Bbox::from_xyxy(0.0, 0.0, 1024.0, 50.0));

        // a box fully outside the bounds collapses
        let outside = Bbox::from_xyxy(2000.0, 0.0, 2100.0, 10.0)
            .clamp(Vec2::ZERO, Vec2::new(1024.0, 768.0));
        assert!(outside.is_empty());

        let union = bbox.union(&Bbox::from_xyxy(0.0, 25.0, 15.0, 40.0));
        assert_eq!(union, Bbox::from_xyxy(0.0, 10.0, 20.0, 40.0));
    }

    #[test]
    fn test_bbox_pixel_rect() {
        let bbox = Bbox::from_xyxy(1.4, 2.6, 10.2, 12.0);
        assert_eq!(bbox.to_pixel_rect(), (1, 2, 10, 10));

        let negative = Bbox::from_xyxy(-3.0, -3.0, 4.0, 4.0);
        assert_eq!(negative.to_pixel_rect(), (0, 0, 4, 4));
    }
}
