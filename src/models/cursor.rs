use serde::{Deserialize, Serialize};

/// Last known pointer position of a remote participant.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CursorPosition {
    pub owner_name: String,
    pub x_percent: f64,
    pub y_percent: f64,
    pub color: String,
}

impl CursorPosition {
    pub fn new(owner_name: impl Into<String>, x: f64, y: f64, color: impl Into<String>) -> Self {
        Self {
            owner_name: owner_name.into(),
            x_percent: clamp_percent(x),
            y_percent: clamp_percent(y),
            color: color.into(),
        }
    }
}

/// Bounding box of the editor surface, in the same units as pointer events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceBounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl SurfaceBounds {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    /// Convert a pointer position into percentages of the box.
    ///
    /// Returns `None` for a collapsed surface.
    pub fn to_percent(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if !(self.width > 0.0 && self.height > 0.0) {
            return None;
        }
        let px = (x - self.left) / self.width * 100.0;
        let py = (y - self.top) / self.height * 100.0;
        Some((clamp_percent(px), clamp_percent(py)))
    }
}

/// Clamp into `[0, 100]`; NaN maps to 0.
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_percent_inside() {
        let bounds = SurfaceBounds::new(100.0, 50.0, 200.0, 400.0);
        assert_eq!(bounds.to_percent(200.0, 250.0), Some((50.0, 50.0)));
    }

    #[test]
    fn test_to_percent_clamps_outside() {
        let bounds = SurfaceBounds::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(bounds.to_percent(-20.0, 150.0), Some((0.0, 100.0)));
    }

    #[test]
    fn test_collapsed_surface() {
        let bounds = SurfaceBounds::new(0.0, 0.0, 0.0, 100.0);
        assert_eq!(bounds.to_percent(10.0, 10.0), None);
    }

    #[test]
    fn test_position_clamps() {
        let pos = CursorPosition::new("Bob", 140.0, f64::NAN, "#abc");
        assert_eq!(pos.x_percent, 100.0);
        assert_eq!(pos.y_percent, 0.0);
    }
}
