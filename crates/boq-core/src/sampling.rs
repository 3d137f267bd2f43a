//! 曲线离散
//!
//! 把线段、圆弧、圆、带凸度的多段线展开成有序的点序列，
//! 供最小外接矩形、区域划分和图层统计使用。
//!
//! 无效输入（非正半径、非有限坐标）返回空序列，不会报错。

use crate::config::EngineConfig;
use crate::geometry::{Arc, Circle, Geometry, Polyline};
use crate::math::{Point2, Vector2, EPSILON};
use crate::transform::Transform2D;
use std::f64::consts::TAU;

/// 曲线离散器
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveSampler {
    /// 圆弧最少段数
    pub arc_min_steps: usize,
    /// 圆弧每段角度（度）
    pub arc_step_degrees: f64,
    /// 凸度弧最少段数
    pub bulge_min_steps: usize,
    /// 凸度弧每段角度（度）
    pub bulge_step_degrees: f64,
}

impl Default for CurveSampler {
    fn default() -> Self {
        Self {
            arc_min_steps: 16,
            arc_step_degrees: 6.0,
            bulge_min_steps: 8,
            bulge_step_degrees: 6.0,
        }
    }
}

impl CurveSampler {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            arc_min_steps: config.arc_min_steps.max(1),
            arc_step_degrees: config.arc_step_degrees,
            bulge_min_steps: config.bulge_min_steps.max(1),
            bulge_step_degrees: config.bulge_step_degrees,
        }
    }

    /// 离散一个几何体
    pub fn sample(&self, geometry: &Geometry) -> Vec<Point2> {
        let points: Vec<Point2> = match geometry {
            Geometry::Line(line) => vec![line.start, line.end],
            Geometry::Arc(arc) => self.sample_arc(arc).collect(),
            Geometry::Circle(circle) => self.sample_circle(circle).collect(),
            Geometry::Polyline(polyline) => self.sample_polyline(polyline),
            Geometry::Hatch(hatch) => hatch
                .boundaries
                .iter()
                .flat_map(|b| b.vertices.iter().copied())
                .collect(),
            Geometry::Text(text) => vec![text.position],
        };
        if points.iter().all(|p| p.x.is_finite() && p.y.is_finite()) {
            points
        } else {
            Vec::new()
        }
    }

    /// 离散后再做放置变换
    pub fn sample_transformed(&self, geometry: &Geometry, transform: &Transform2D) -> Vec<Point2> {
        self.sample(geometry)
            .iter()
            .map(|p| transform.transform_point(p))
            .collect()
    }

    /// 圆弧点序列（惰性），包含首尾共 `steps + 1` 个点
    pub fn sample_arc<'a>(&self, arc: &'a Arc) -> impl Iterator<Item = Point2> + 'a {
        let valid = arc.radius > 0.0 && arc.radius.is_finite();
        let sweep = arc.sweep_angle();
        let steps = if valid {
            self.arc_steps(sweep.to_degrees())
        } else {
            0
        };
        let count = if valid { steps + 1 } else { 0 };
        (0..count).map(move |i| {
            let a = arc.start_angle + sweep * (i as f64 / steps as f64);
            arc.center + Vector2::new(a.cos(), a.sin()) * arc.radius
        })
    }

    /// 整圆点序列（惰性）
    pub fn sample_circle(&self, circle: &Circle) -> impl Iterator<Item = Point2> {
        let arc = Arc::new(circle.center, circle.radius, 0.0, TAU);
        self.sample_arc(&arc).collect::<Vec<_>>().into_iter()
    }

    fn arc_steps(&self, sweep_degrees: f64) -> usize {
        step_count(sweep_degrees, self.arc_step_degrees, self.arc_min_steps)
    }

    /// 凸度弧段：从 `p1` 到 `p2`，凸度为 `bulge`
    ///
    /// 凸度近似为 0 时返回弦的两个端点；弦长近似为 0 时只返回起点。
    pub fn bulge_segment(&self, p1: Point2, p2: Point2, bulge: f64) -> Vec<Point2> {
        if bulge.abs() < EPSILON {
            return vec![p1, p2];
        }
        let chord = p2 - p1;
        let c = chord.norm();
        if c < EPSILON {
            return vec![p1];
        }

        let theta = 4.0 * bulge.atan();
        // sin(θ/2) 与 cos(θ/2) 由凸度直接得到
        let b2 = bulge * bulge;
        let sin_half = 2.0 * bulge / (1.0 + b2);
        if sin_half.abs() < EPSILON {
            return vec![p1, p2];
        }
        let cos_half = (1.0 - b2) / (1.0 + b2);
        let r = c / (2.0 * sin_half);

        let normal = Vector2::new(-chord.y / c, chord.x / c);
        let mid = Point2::new((p1.x + p2.x) * 0.5, (p1.y + p2.y) * 0.5);
        let center = mid + normal * (r * cos_half);

        let a1 = (p1.y - center.y).atan2(p1.x - center.x);
        let a2 = (p2.y - center.y).atan2(p2.x - center.x);
        let raw_ccw = (a2 - a1).rem_euclid(TAU);
        let sweep = if theta >= 0.0 { raw_ccw } else { raw_ccw - TAU };

        let steps = step_count(
            sweep.abs().to_degrees(),
            self.bulge_step_degrees,
            self.bulge_min_steps,
        );
        let radius = r.abs();
        (0..=steps)
            .map(|i| {
                let a = a1 + sweep * (i as f64 / steps as f64);
                center + Vector2::new(a.cos(), a.sin()) * radius
            })
            .collect()
    }

    /// 多段线：逐段展开（闭合时包含闭合段），共享顶点不重复，
    /// 以最后一个顶点结束，闭合时再回到第一个顶点
    pub fn sample_polyline(&self, polyline: &Polyline) -> Vec<Point2> {
        let vertices = &polyline.vertices;
        let (Some(first), Some(last)) = (vertices.first(), vertices.last()) else {
            return Vec::new();
        };
        let n = vertices.len();

        let mut points = Vec::new();
        for i in 0..polyline.segment_count() {
            let v = &vertices[i];
            let next = &vertices[(i + 1) % n];
            let seg = self.bulge_segment(v.point, next.point, v.bulge);
            let keep = seg.len().saturating_sub(1);
            points.extend_from_slice(&seg[..keep]);
        }
        points.push(last.point);
        if polyline.closed {
            points.push(first.point);
        }
        points
    }
}

/// 按角度计算段数，容忍浮点误差（360° / 6° 得到 60 而不是 59）
fn step_count(sweep_degrees: f64, step_degrees: f64, min_steps: usize) -> usize {
    let by_angle = (sweep_degrees / step_degrees + 1e-9).floor() as usize;
    by_angle.max(min_steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Hatch, HatchBoundary, Line, PolylineVertex, Text};
    use crate::math::distance;
    use approx::assert_relative_eq;

    #[test]
    fn test_line_gives_endpoints() {
        let sampler = CurveSampler::default();
        let line = Line::new(Point2::new(1.0, 2.0), Point2::new(3.0, 4.0));
        let pts = sampler.sample(&Geometry::Line(line));
        assert_eq!(pts, vec![Point2::new(1.0, 2.0), Point2::new(3.0, 4.0)]);
    }

    #[test]
    fn test_circle_has_at_least_sixteen_segments() {
        let sampler = CurveSampler::default();
        let circle = Circle::new(Point2::new(5.0, 5.0), 2.0);
        let pts: Vec<_> = sampler.sample_circle(&circle).collect();
        // 360° / 6° = 60 段
        assert_eq!(pts.len(), 61);
        for p in &pts {
            assert_relative_eq!(distance(p, &circle.center), 2.0, epsilon = 1e-9);
        }
        assert_relative_eq!(pts[0].x, pts[60].x, epsilon = 1e-9);
        assert_relative_eq!(pts[0].y, pts[60].y, epsilon = 1e-9);
    }

    #[test]
    fn test_small_arc_uses_minimum_steps() {
        let sampler = CurveSampler::default();
        let arc = Arc::new(Point2::origin(), 1.0, 0.0, 30f64.to_radians());
        let pts: Vec<_> = sampler.sample_arc(&arc).collect();
        assert_eq!(pts.len(), 17);
        assert_relative_eq!(pts[16].x, 30f64.to_radians().cos(), epsilon = 1e-12);
    }

    #[test]
    fn test_non_positive_radius_is_empty() {
        let sampler = CurveSampler::default();
        let arc = Arc::new(Point2::origin(), 0.0, 0.0, 1.0);
        assert!(sampler.sample(&Geometry::Arc(arc)).is_empty());
        let circle = Circle::new(Point2::origin(), -1.0);
        assert!(sampler.sample(&Geometry::Circle(circle)).is_empty());
    }

    #[test]
    fn test_zero_bulge_is_exact_chord() {
        let sampler = CurveSampler::default();
        let p1 = Point2::new(0.0, 0.0);
        let p2 = Point2::new(10.0, 3.0);
        assert_eq!(sampler.bulge_segment(p1, p2, 0.0), vec![p1, p2]);
        assert_eq!(sampler.bulge_segment(p1, p2, 1e-13), vec![p1, p2]);
    }

    #[test]
    fn test_degenerate_chord_is_single_point() {
        let sampler = CurveSampler::default();
        let p = Point2::new(2.0, 2.0);
        assert_eq!(sampler.bulge_segment(p, p, 0.5), vec![p]);
    }

    #[test]
    fn test_semicircle_bulge() {
        let sampler = CurveSampler::default();
        let p1 = Point2::new(0.0, 0.0);
        let p2 = Point2::new(2.0, 0.0);

        // 凸度 1 为逆时针半圆，圆心 (1, 0)，从左端经下方到右端
        let ccw = sampler.bulge_segment(p1, p2, 1.0);
        let first = ccw[0];
        let last = ccw[ccw.len() - 1];
        assert_relative_eq!(first.x, p1.x, epsilon = 1e-9);
        assert_relative_eq!(last.x, p2.x, epsilon = 1e-9);
        assert_relative_eq!(last.y, p2.y, epsilon = 1e-9);
        let center = Point2::new(1.0, 0.0);
        for p in &ccw {
            assert_relative_eq!(distance(p, &center), 1.0, epsilon = 1e-9);
            assert!(p.y <= 1e-9);
        }

        // 凸度 -1 为顺时针半圆，在弦的上方
        let cw = sampler.bulge_segment(p1, p2, -1.0);
        assert_relative_eq!(cw[0].x, p1.x, epsilon = 1e-9);
        assert_relative_eq!(cw[cw.len() - 1].x, p2.x, epsilon = 1e-9);
        for p in &cw {
            assert!(p.y >= -1e-9);
        }
    }

    #[test]
    fn test_closed_polyline_returns_to_start() {
        let sampler = CurveSampler::default();
        let square = Polyline::from_points(
            [
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(0.0, 1.0),
            ],
            true,
        );
        let pts = sampler.sample_polyline(&square);
        assert_eq!(
            pts,
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(0.0, 1.0),
                Point2::new(0.0, 1.0),
                Point2::new(0.0, 0.0),
            ]
        );
    }

    #[test]
    fn test_open_polyline_with_bulge() {
        let sampler = CurveSampler::default();
        let polyline = Polyline::new(
            vec![
                PolylineVertex::with_bulge(Point2::new(0.0, 0.0), 1.0),
                PolylineVertex::new(Point2::new(2.0, 0.0)),
                PolylineVertex::new(Point2::new(2.0, 5.0)),
            ],
            false,
        );
        let pts = sampler.sample_polyline(&polyline);
        // 半圆 180° / 6° = 30 段，去掉末点后 30 个点，加上直线起点与终点
        assert_eq!(pts.len(), 32);
        assert_eq!(pts[pts.len() - 1], Point2::new(2.0, 5.0));
    }

    #[test]
    fn test_hatch_and_text() {
        let sampler = CurveSampler::default();
        let boundary = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
        ];
        let hatch = Hatch::new(vec![HatchBoundary::new(boundary.clone(), true)]);
        assert_eq!(sampler.sample(&Geometry::Hatch(hatch)), boundary);

        let text = Text::new(Point2::new(4.0, 4.0), "A", 1.0);
        assert_eq!(sampler.sample(&Geometry::Text(text)), vec![Point2::new(4.0, 4.0)]);
    }

    #[test]
    fn test_non_finite_input_is_empty() {
        let sampler = CurveSampler::default();
        let line = Line::new(Point2::new(f64::NAN, 0.0), Point2::new(1.0, 1.0));
        assert!(sampler.sample(&Geometry::Line(line)).is_empty());
    }
}
