//! 从原始扫描到肺部表面网格的完整流程.
//!
//! 标定 -> 分割 (含空洞填充) -> 用掩膜遮蔽扫描 -> 等值面提取 -> (可选) 平滑.

use crate::consts::hu;
use crate::segment::{segment_lung_mask, SegmentParams, Segmentation};
use crate::surface::{marching_cubes, Mesh, SmoothParams};
use crate::{CtVolume, LungMask, LungResult, RawVolume, VoxelGeometry};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 完整流程的参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PipelineParams {
    /// 分割参数. 默认开启空洞填充.
    pub segment: SegmentParams,

    /// 在遮蔽后的扫描上提取表面的 HU 等值. 默认为 -500.
    pub iso_value: f64,

    /// 平滑参数. 默认不平滑.
    pub smooth: Option<SmoothParams>,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            segment: SegmentParams::default(),
            iso_value: hu::LUNG_SURFACE_ISO as f64,
            smooth: None,
        }
    }
}

/// 完整流程的结果.
#[derive(Debug, Clone)]
pub struct LungSurface {
    /// 分割结果.
    pub segmentation: Segmentation,

    /// 掩膜外的体素被置为 `hu::MASKED_OUT` 的扫描.
    pub masked: CtVolume,

    /// 肺部表面网格, 法向指向肺外. 未找到肺部时为空.
    pub mesh: Mesh,
}

impl LungSurface {
    /// 肺部掩膜.
    #[inline]
    pub fn mask(&self) -> &LungMask {
        self.segmentation.mask()
    }
}

/// 对原始扫描执行完整流程.
#[inline]
pub fn lung_surface(raw: &RawVolume, params: &PipelineParams) -> LungResult<LungSurface> {
    lung_surface_hu(&raw.to_hu(), params)
}

/// 对已标定的扫描执行完整流程.
///
/// # 注意
///
/// 遮蔽后的扫描中, 肺部体素约为 -900 HU, 其余为 `hu::MASKED_OUT`,
/// 因此表面位于两者之间的等值处, 而不是原扫描中的组织边界.
/// 肺部总是等值面的低值一侧, 网格绕序被翻转, 使法向指向肺外.
/// 未找到肺部, 或者遮蔽后的扫描在 `iso_value` 处不存在表面时, 网格为空, 不视为错误.
pub fn lung_surface_hu(scan: &CtVolume, params: &PipelineParams) -> LungResult<LungSurface> {
    log::info!(
        "肺部表面提取: 形状 {:?}, 体素间距 {:?} mm",
        scan.shape(),
        scan.pix_dim()
    );
    let segmentation = segment_lung_mask(scan, &params.segment)?;
    let masked = segmentation.mask().apply_to(scan)?;

    let mesh = if segmentation.has_foreground() {
        match marching_cubes(masked.data(), masked.geometry(), params.iso_value) {
            Ok(mut m) => {
                m.flip();
                m
            }
            Err(e) if e.is_degenerate_iso() => {
                log::warn!("{e}, 输出空网格");
                Mesh::new()
            }
            Err(e) => return Err(e),
        }
    } else {
        Mesh::new()
    };

    let mesh = match params.smooth {
        Some(s) => mesh.smooth(&s),
        None => mesh,
    };
    log::info!(
        "肺部表面提取完成: {} 个三角形, 表面积 {:.1} mm²",
        mesh.len(),
        mesh.area()
    );
    Ok(LungSurface {
        segmentation,
        masked,
        mesh,
    })
}
