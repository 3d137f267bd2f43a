//! 最小面积外接矩形
//!
//! 凸包（单调链）+ 旋转卡尺：对凸包的每条边，把凸包投影到以该边为 x 轴
//! 的坐标系中，取面积最小的投影矩形。结果与图形的旋转无关。

use crate::math::{distance, Point2, EPSILON};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 外接矩形尺寸，`length >= width`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub length: f64,
    pub width: f64,
}

impl Extent {
    pub fn new(a: f64, b: f64) -> Self {
        if a >= b {
            Self {
                length: a,
                width: b,
            }
        } else {
            Self {
                length: b,
                width: a,
            }
        }
    }

    pub fn area(&self) -> f64 {
        self.length * self.width
    }
}

fn cross(o: &Point2, a: &Point2, b: &Point2) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// 单调链凸包，逆时针，不含共线点；输入先去重
pub fn convex_hull(points: &[Point2]) -> Vec<Point2> {
    let mut pts: Vec<Point2> = points.to_vec();
    pts.sort_by(|a, b| match a.x.total_cmp(&b.x) {
        Ordering::Equal => a.y.total_cmp(&b.y),
        other => other,
    });
    pts.dedup();
    if pts.len() <= 1 {
        return pts;
    }

    let mut lower: Vec<Point2> = Vec::with_capacity(pts.len());
    for p in &pts {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<Point2> = Vec::with_capacity(pts.len());
    for p in pts.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(*p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// 计算点集的最小面积外接矩形尺寸
///
/// 0 或 1 个不同的点返回 (0, 0)；共线点返回 (长度, 0)。
pub fn oriented_extent(points: &[Point2]) -> Extent {
    let hull = convex_hull(points);
    match hull.len() {
        0 | 1 => return Extent::default(),
        2 => return Extent::new(distance(&hull[0], &hull[1]), 0.0),
        _ => {}
    }

    let n = hull.len();
    let mut best: Option<Extent> = None;
    for i in 0..n {
        let a = hull[i];
        let b = hull[(i + 1) % n];
        let edge = b - a;
        let len = edge.norm();
        if len < EPSILON {
            continue;
        }
        let (cos_t, sin_t) = (edge.x / len, edge.y / len);

        let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in &hull {
            let xr = p.x * cos_t + p.y * sin_t;
            let yr = -p.x * sin_t + p.y * cos_t;
            min_x = min_x.min(xr);
            max_x = max_x.max(xr);
            min_y = min_y.min(yr);
            max_y = max_y.max(yr);
        }

        let candidate = Extent::new(max_x - min_x, max_y - min_y);
        if best.map_or(true, |b| candidate.area() < b.area()) {
            best = Some(candidate);
        }
    }
    best.unwrap_or_default()
}
