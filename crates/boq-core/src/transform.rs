//! 2D变换操作
//!
//! 块参照的放置变换（基点偏移、缩放、旋转、平移）用齐次矩阵表示，
//! 嵌套块参照时逐层组合。

use crate::math::{Matrix3, Point2};
use serde::{Deserialize, Serialize};

/// 2D仿射变换
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform2D {
    matrix: Matrix3,
}

impl Transform2D {
    /// 创建单位变换
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    /// 创建平移变换
    pub fn translation(dx: f64, dy: f64) -> Self {
        Self {
            matrix: Matrix3::new(
                1.0, 0.0, dx,
                0.0, 1.0, dy,
                0.0, 0.0, 1.0,
            ),
        }
    }

    /// 创建旋转变换（绕原点）
    pub fn rotation(angle: f64) -> Self {
        let cos = angle.cos();
        let sin = angle.sin();
        Self {
            matrix: Matrix3::new(
                cos, -sin, 0.0,
                sin, cos, 0.0,
                0.0, 0.0, 1.0,
            ),
        }
    }

    /// 创建缩放变换（绕原点）
    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            matrix: Matrix3::new(
                sx, 0.0, 0.0,
                0.0, sy, 0.0,
                0.0, 0.0, 1.0,
            ),
        }
    }

    /// 块参照的放置变换：块坐标减基点，缩放，旋转，再平移到插入点
    pub fn placement(
        insertion_point: Point2,
        base_point: Point2,
        scale_x: f64,
        scale_y: f64,
        rotation: f64,
    ) -> Self {
        Self::translation(insertion_point.x, insertion_point.y)
            .then(&Self::rotation(rotation))
            .then(&Self::scale(scale_x, scale_y))
            .then(&Self::translation(-base_point.x, -base_point.y))
    }

    /// 组合两个变换（self 在后，other 在前）
    pub fn then(&self, other: &Transform2D) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// 变换一个点
    pub fn transform_point(&self, point: &Point2) -> Point2 {
        let v = self.matrix * nalgebra::Vector3::new(point.x, point.y, 1.0);
        Point2::new(v.x, v.y)
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::identity()
    }
}
