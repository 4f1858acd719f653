//! HU 标定.
//!
//! 原始传感器整数经过线性变换 `v' = v * slope + intercept` 得到 HU 值.
//! 扫描范围外的哨兵值 [`OUT_OF_SCAN`] 在变换前被置为 0.

use ndarray::{Array3, ArrayView3};
use nifti::NiftiHeader;

use crate::consts::hu::OUT_OF_SCAN;
use crate::{LungError, LungResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// rescale 参数 (slope/intercept).
///
/// 该对象是只读的, 构造时即完成合法性检查.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rescale {
    slope: f64,
    intercept: f64,
}

impl Default for Rescale {
    #[inline]
    fn default() -> Self {
        Self::identity()
    }
}

impl Rescale {
    /// 构建 rescale 参数.
    ///
    /// `slope` 为 0 或不是有限值, 或者 `intercept` 不是有限值时,
    /// 返回 `Err(LungError::InvalidCalibration)`.
    pub fn new(slope: f64, intercept: f64) -> LungResult<Self> {
        if slope != 0.0 && slope.is_finite() && intercept.is_finite() {
            Ok(Self { slope, intercept })
        } else {
            Err(LungError::InvalidCalibration { slope, intercept })
        }
    }

    /// 恒等变换.
    #[inline]
    pub const fn identity() -> Self {
        Self {
            slope: 1.0,
            intercept: 0.0,
        }
    }

    /// 从 NIfTI header 的 `scl_slope`/`scl_inter` 读取.
    ///
    /// 按照 NIfTI 标准, `scl_slope == 0` 表示未设置, 此时返回恒等变换.
    pub fn from_header(h: &NiftiHeader) -> LungResult<Self> {
        if h.scl_slope == 0.0 {
            return Ok(Self::identity());
        }
        Self::new(h.scl_slope as f64, h.scl_inter as f64)
    }

    /// 斜率.
    #[inline]
    pub fn slope(&self) -> f64 {
        self.slope
    }

    /// 截距.
    #[inline]
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// 对单个原始值进行标定.
    #[inline]
    pub fn eval(&self, raw: i16) -> f32 {
        let v = if raw == OUT_OF_SCAN { 0 } else { raw };
        if self.slope == 1.0 {
            // 纯平移.
            (v as f64 + self.intercept) as f32
        } else {
            (v as f64 * self.slope + self.intercept) as f32
        }
    }

    /// 将原始体数据标定为 HU 值, 返回新的数组. 输入不会被修改.
    pub fn to_hu(&self, raw: ArrayView3<i16>) -> Array3<f32> {
        raw.map(|&v| self.eval(v))
    }
}
