//! Polygon and point regions of interest, and their pairing.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::volume::Rect;

/// Hand-drawn cell outline, replicated through every slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonRoi {
    pub name: String,
    pub vertices: Vec<DVec2>,
}

/// Soma center marker. `z` is the 0-based slice index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRoi {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: usize,
}

/// All ROIs drawn on one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoiSet {
    #[serde(default)]
    pub polygons: Vec<PolygonRoi>,
    #[serde(default)]
    pub points: Vec<PointRoi>,
}

/// A polygon together with its soma point.
#[derive(Debug, Clone, PartialEq)]
pub struct RoiPair {
    pub polygon: PolygonRoi,
    pub point: PointRoi,
}

impl PolygonRoi {
    pub fn new(name: impl Into<String>, vertices: Vec<DVec2>) -> Self {
        Self {
            name: name.into(),
            vertices,
        }
    }

    /// Smallest pixel rectangle enclosing all vertices.
    ///
    /// Negative coordinates are clipped to the image origin.
    pub fn bounds(&self) -> Rect {
        if self.vertices.is_empty() {
            return Rect::new(0, 0, 0, 0);
        }
        let min = self
            .vertices
            .iter()
            .fold(DVec2::splat(f64::INFINITY), |acc, v| acc.min(*v));
        let max = self
            .vertices
            .iter()
            .fold(DVec2::splat(f64::NEG_INFINITY), |acc, v| acc.max(*v));
        let x0 = min.x.floor().max(0.0);
        let y0 = min.y.floor().max(0.0);
        let x1 = max.x.ceil().max(x0);
        let y1 = max.y.ceil().max(y0);
        Rect::new(
            x0 as usize,
            y0 as usize,
            (x1 - x0) as usize,
            (y1 - y0) as usize,
        )
    }

    /// Copy shifted by `-offset`.
    pub fn translated(&self, offset: DVec2) -> PolygonRoi {
        PolygonRoi {
            name: self.name.clone(),
            vertices: self.vertices.iter().map(|v| *v - offset).collect(),
        }
    }

    /// Even-odd containment test for a point in pixel coordinates.
    pub fn contains(&self, p: DVec2) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[j];
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
                if p.x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

impl PointRoi {
    pub fn new(name: impl Into<String>, x: f64, y: f64, z: usize) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            z,
        }
    }

    /// Copy expressed in the coordinates of a crop starting at `origin`.
    pub fn relative_to(&self, origin: Rect) -> PointRoi {
        PointRoi {
            name: self.name.clone(),
            x: self.x - origin.x as f64,
            y: self.y - origin.y as f64,
            z: self.z,
        }
    }
}

/// Matches every polygon with the point ROI whose name contains the polygon's name.
///
/// Substring matching is ambiguous when names are prefixes of one another
/// ("cell1" vs "cell12"), so several candidates only resolve when exactly one
/// of them carries the polygon's name verbatim; anything else is reported.
pub fn pair_rois(image: &str, polygons: &[PolygonRoi], points: &[PointRoi]) -> Result<Vec<RoiPair>> {
    polygons
        .iter()
        .map(|polygon| {
            let candidates: Vec<&PointRoi> = points
                .iter()
                .filter(|p| p.name.contains(&polygon.name))
                .collect();

            let point = match candidates.as_slice() {
                [] => {
                    return Err(Error::MissingPointRoi {
                        image: image.to_string(),
                        roi: polygon.name.clone(),
                    })
                }
                [only] => *only,
                many => {
                    let exact: Vec<&&PointRoi> =
                        many.iter().filter(|p| p.name == polygon.name).collect();
                    match exact.as_slice() {
                        [only] => **only,
                        _ => {
                            return Err(Error::AmbiguousPointRoi {
                                image: image.to_string(),
                                roi: polygon.name.clone(),
                                candidates: many.iter().map(|p| p.name.clone()).collect(),
                            })
                        }
                    }
                }
            };

            Ok(RoiPair {
                polygon: polygon.clone(),
                point: point.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(name: &str, x: f64, y: f64, size: f64) -> PolygonRoi {
        PolygonRoi::new(
            name,
            vec![
                DVec2::new(x, y),
                DVec2::new(x + size, y),
                DVec2::new(x + size, y + size),
                DVec2::new(x, y + size),
            ],
        )
    }

    #[test]
    fn test_bounds_of_square() {
        let roi = square("a", 3.0, 4.0, 10.0);
        assert_eq!(roi.bounds(), Rect::new(3, 4, 10, 10));
    }

    #[test]
    fn test_bounds_rounds_outwards() {
        let roi = PolygonRoi::new(
            "tri",
            vec![
                DVec2::new(1.5, 2.2),
                DVec2::new(6.1, 2.2),
                DVec2::new(3.0, 7.9),
            ],
        );
        assert_eq!(roi.bounds(), Rect::new(1, 2, 6, 6));
    }

    #[test]
    fn test_contains_square_and_triangle() {
        let roi = square("a", 0.0, 0.0, 4.0);
        assert!(roi.contains(DVec2::new(0.5, 0.5)));
        assert!(roi.contains(DVec2::new(3.5, 3.5)));
        assert!(!roi.contains(DVec2::new(4.5, 0.5)));

        let tri = PolygonRoi::new(
            "tri",
            vec![
                DVec2::new(0.0, 0.0),
                DVec2::new(10.0, 0.0),
                DVec2::new(0.0, 10.0),
            ],
        );
        assert!(tri.contains(DVec2::new(2.0, 2.0)));
        assert!(!tri.contains(DVec2::new(8.0, 8.0)));
    }

    #[test]
    fn test_degenerate_polygon_contains_nothing() {
        let line = PolygonRoi::new("l", vec![DVec2::new(0.0, 0.0), DVec2::new(5.0, 5.0)]);
        assert!(!line.contains(DVec2::new(2.0, 2.0)));
    }

    #[test]
    fn test_pairing_by_substring() {
        let polygons = vec![square("cell1", 0.0, 0.0, 5.0), square("cell2", 0.0, 0.0, 5.0)];
        let points = vec![
            PointRoi::new("soma_cell2", 1.0, 1.0, 0),
            PointRoi::new("soma_cell1", 2.0, 2.0, 1),
        ];
        let pairs = pair_rois("img", &polygons, &points).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].point.name, "soma_cell1");
        assert_eq!(pairs[1].point.name, "soma_cell2");
    }

    #[test]
    fn test_pairing_missing_point() {
        let polygons = vec![square("cell1", 0.0, 0.0, 5.0)];
        let points = vec![PointRoi::new("other", 1.0, 1.0, 0)];
        let err = pair_rois("img", &polygons, &points).unwrap_err();
        assert!(matches!(err, Error::MissingPointRoi { ref roi, .. } if roi == "cell1"));
    }

    #[test]
    fn test_pairing_prefix_collision_prefers_exact_name() {
        let polygons = vec![square("cell1", 0.0, 0.0, 5.0)];
        let points = vec![
            PointRoi::new("cell12", 1.0, 1.0, 0),
            PointRoi::new("cell1", 2.0, 2.0, 0),
        ];
        let pairs = pair_rois("img", &polygons, &points).unwrap();
        assert_eq!(pairs[0].point.name, "cell1");
    }

    #[test]
    fn test_pairing_ambiguous_is_reported() {
        let polygons = vec![square("cell1", 0.0, 0.0, 5.0)];
        let points = vec![
            PointRoi::new("a_cell1", 1.0, 1.0, 0),
            PointRoi::new("b_cell1", 2.0, 2.0, 0),
        ];
        let err = pair_rois("img", &polygons, &points).unwrap_err();
        match err {
            Error::AmbiguousPointRoi { candidates, .. } => assert_eq!(candidates.len(), 2),
            other => panic!("expected AmbiguousPointRoi, got {other:?}"),
        }
    }

    #[test]
    fn test_point_relative_to_crop() {
        let p = PointRoi::new("p", 12.0, 7.5, 3);
        let rel = p.relative_to(Rect::new(10, 5, 20, 20));
        assert_eq!((rel.x, rel.y, rel.z), (2.0, 2.5, 3));
    }

    #[test]
    fn test_roi_set_json() {
        let json = r#"{
            "polygons": [{"name": "cell1", "vertices": [[0, 0], [4, 0], [4, 4]]}],
            "points": [{"name": "cell1", "x": 1.0, "y": 2.0, "z": 0}]
        }"#;
        let set: RoiSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.polygons[0].vertices.len(), 3);
        assert_eq!(set.points[0].y, 2.0);
    }
}
