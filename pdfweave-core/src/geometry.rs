//! Basic geometric types for PDF

use crate::objects::Object;

/// A point in 2D space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

/// A rectangle defined by its lower-left and upper-right corners
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub lower_left: Point,
    pub upper_right: Point,
}

impl Rectangle {
    pub fn new(lower_left: Point, upper_right: Point) -> Self {
        Self {
            lower_left,
            upper_right,
        }
    }

    pub fn from_position_and_size(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            lower_left: Point::new(x, y),
            upper_right: Point::new(x + width, y + height),
        }
    }

    /// US Letter media box, 612 x 792 points.
    pub fn letter() -> Self {
        Self::from_position_and_size(0.0, 0.0, 612.0, 792.0)
    }

    /// ISO A4 media box, 595 x 842 points.
    pub fn a4() -> Self {
        Self::from_position_and_size(0.0, 0.0, 595.0, 842.0)
    }

    pub fn width(&self) -> f64 {
        self.upper_right.x - self.lower_left.x
    }

    pub fn height(&self) -> f64 {
        self.upper_right.y - self.lower_left.y
    }

    /// `[llx lly urx ury]` array
    pub fn to_array(&self) -> Object {
        Object::Array(vec![
            Object::Real(self.lower_left.x),
            Object::Real(self.lower_left.y),
            Object::Real(self.upper_right.x),
            Object::Real(self.upper_right.y),
        ])
    }
}

/// Affine transformation `[a b c d e f]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix(pub [f64; 6]);

impl Matrix {
    pub const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn to_array(&self) -> Object {
        Object::Array(self.0.iter().map(|v| Object::Real(*v)).collect())
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point() {
        let p = Point::new(10.0, 20.0);
        assert_eq!(p.x, 10.0);
        assert_eq!(p.y, 20.0);
        assert_eq!(Point::origin(), Point::new(0.0, 0.0));
    }

    #[test]
    fn test_rectangle_dimensions() {
        let rect = Rectangle::from_position_and_size(10.0, 20.0, 100.0, 50.0);
        assert_eq!(rect.width(), 100.0);
        assert_eq!(rect.height(), 50.0);
        assert_eq!(rect.upper_right, Point::new(110.0, 70.0));
    }

    #[test]
    fn test_rectangle_to_array() {
        let arr = Rectangle::letter().to_array();
        let values: Vec<f64> = arr
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_real().unwrap())
            .collect();
        assert_eq!(values, vec![0.0, 0.0, 612.0, 792.0]);
    }

    #[test]
    fn test_matrix_identity() {
        assert!(Matrix::default().is_identity());
        assert!(!Matrix([2.0, 0.0, 0.0, 2.0, 0.0, 0.0]).is_identity());
        assert_eq!(Matrix::IDENTITY.to_array().as_array().unwrap().len(), 6);
    }
}
