//! 运行时错误.

use thiserror::Error;

/// 分割 / 等值面提取 / 导出的运行时错误.
///
/// 注意 "没有找到肺部前景" 不是错误, 见 [`crate::segment::Segmentation::NoForeground`].
#[derive(Debug, Error)]
pub enum LungError {
    /// rescale 参数非法: `slope` 为 0 或不是有限值, 或 `intercept` 不是有限值.
    #[error("无效的标定参数: slope = {slope}, intercept = {intercept}")]
    InvalidCalibration {
        /// 斜率.
        slope: f64,
        /// 截距.
        intercept: f64,
    },

    /// 阶段之间或输入之间的形状不一致.
    #[error("形状不一致: 期望 {expected:?}, 实际 {found:?}")]
    ShapeMismatch {
        /// 期望形状.
        expected: Vec<usize>,
        /// 实际形状.
        found: Vec<usize>,
    },

    /// 输入体数据不含任何体素.
    #[error("体数据为空")]
    EmptyVolume,

    /// 体素间距非正或不是有限值.
    #[error("无效的体素间距: {0:?}")]
    InvalidSpacing([f64; 3]),

    /// 等值面完全落在体数据标量范围之外, 不会产生任何三角形.
    #[error("等值面 {iso} 不在标量范围 ({min}, {max}] 内")]
    DegenerateIsoValue {
        /// 等值.
        iso: f64,
        /// 体数据最小值.
        min: f64,
        /// 体数据最大值.
        max: f64,
    },

    /// NIfTI 文件读取错误.
    #[error("NIfTI 读取失败: {0}")]
    Nifti(#[from] nifti::NiftiError),

    /// 文件写入错误.
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl LungError {
    /// 由两个形状构造 [`LungError::ShapeMismatch`].
    pub(crate) fn shape_mismatch(expected: &[usize], found: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }

    /// 是否是 "该等值下没有表面" 这类可被视为空网格的结果.
    #[inline]
    pub fn is_degenerate_iso(&self) -> bool {
        matches!(self, Self::DegenerateIsoValue { .. })
    }
}

/// 运行时结果.
pub type LungResult<T> = Result<T, LungError>;
