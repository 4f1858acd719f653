//! 肺部掩膜分割.
//!
//! 算法流程依次为:
//!
//! 1. 阈值化: HU 值 `>= threshold` 的体素为致密组织 (`class::TISSUE`),
//!   其余为空气 / 肺内部候选 (`class::AIR`).
//! 2. 体外空气移除: 对上一步结果做 3D 连通域标记 (不设背景类别),
//!   与 `(0, 0, 0)` 同属一个连通域的体素全部改为 `class::EXTERIOR`.
//! 3. 逐切片空洞填充 (可选): 在每个水平切片上, 将非空气像素
//!   (组织 + 体外) 按 2D 规则标记连通域, 只保留最大的一个,
//!   其余区域中的组织 (肺内的血管, 结节等小孤岛) 改为空气.
//!   体外像素不会变成空气, 因此 `(0, 0, 0)` 永远不属于肺部.
//!   各切片互相独立.
//! 4. 全局最大连通域: 以空气为前景做 3D 连通域标记, 只保留体素最多的一个.
//!
//! 每个阶段都返回新的数组, 不会修改上一阶段的结果, 因此可以单独审查和测试.
//!
//! # 注意
//!
//! 第 2 步假设 `(0, 0, 0)` 角点一定位于体外, 第 3 步假设第 0 轴是水平切片方向.
//! 这两点对常见的水平扫描成立, 但并不是一般性的几何保证.

use ndarray::{Array3, ArrayView3, ArrayViewMut2, Axis};

use crate::consts::{class, hu, mask, BACKGROUND_LABEL};
use crate::label::{
    label_2d, label_3d, label_3d_with_background, largest_label, Connectivity2d, Connectivity3d,
};
use crate::{CtVolume, LungError, LungMask, LungResult, VoxelGeometry};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 分割参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentParams {
    /// 空气 / 组织分界 (HU). 默认为 -700.
    pub threshold: f32,

    /// 是否执行逐切片空洞填充. 默认为 `true`.
    pub fill_lung_structures: bool,

    /// 3D 连通域标记的邻接规则. 默认为 6-邻接.
    pub connectivity: Connectivity3d,

    /// 逐切片填充时 2D 连通域标记的邻接规则. 默认为 8-邻接.
    pub slice_connectivity: Connectivity2d,
}

impl Default for SegmentParams {
    fn default() -> Self {
        Self {
            threshold: hu::AIR_TISSUE_THRESHOLD,
            fill_lung_structures: true,
            connectivity: Connectivity3d::Face,
            slice_connectivity: Connectivity2d::Full,
        }
    }
}

impl SegmentParams {
    /// 与默认值相同, 但不执行逐切片空洞填充.
    #[inline]
    pub fn without_fill() -> Self {
        Self {
            fill_lung_structures: false,
            ..Default::default()
        }
    }
}

/// 分割结果.
#[derive(Debug, Clone, PartialEq)]
pub enum Segmentation {
    /// 找到了肺部.
    Lungs(LungMask),

    /// 不存在任何肺内部候选体素. 掩膜为全背景. 这不是错误.
    NoForeground(LungMask),
}

impl Segmentation {
    /// 获取掩膜. 对于 `NoForeground`, 掩膜为全背景.
    #[inline]
    pub fn mask(&self) -> &LungMask {
        match self {
            Self::Lungs(m) | Self::NoForeground(m) => m,
        }
    }

    /// 获取掩膜的所有权.
    #[inline]
    pub fn into_mask(self) -> LungMask {
        match self {
            Self::Lungs(m) | Self::NoForeground(m) => m,
        }
    }

    /// 是否找到了肺部?
    #[inline]
    pub fn has_foreground(&self) -> bool {
        matches!(self, Self::Lungs(_))
    }
}

/// 各阶段的中间结果快照.
#[derive(Debug, Clone)]
pub struct Stages {
    /// 第 1 步: 阈值化结果.
    pub binary: Array3<u8>,

    /// 第 2 步: 体外区域已被标记.
    pub exterior_removed: Array3<u8>,

    /// 第 3 步: 逐切片填充结果. 若未开启填充, 则与第 2 步相同.
    pub filled: Array3<u8>,

    /// 第 4 步: 最终二值掩膜.
    pub mask: Array3<u8>,

    /// 最终保留的连通域体素数. 不存在肺内部候选时为 `None`.
    pub kept: Option<usize>,
}

/// 阈值化. HU 值 `>= threshold` 的体素为 `class::TISSUE`, 其余 (包括 NaN) 为 `class::AIR`.
pub fn binarize(scan: ArrayView3<f32>, threshold: f32) -> Array3<u8> {
    scan.map(|&v| if v >= threshold { class::TISSUE } else { class::AIR })
}

/// 体外区域标记. 与 `(0, 0, 0)` 连通 (同类别) 的体素被改为 `class::EXTERIOR`,
/// 无论其原本的类别.
///
/// 数据为空时返回 `Err(LungError::EmptyVolume)`.
pub fn remove_exterior(
    classes: ArrayView3<u8>,
    connectivity: Connectivity3d,
) -> LungResult<Array3<u8>> {
    if classes.is_empty() {
        return Err(LungError::EmptyVolume);
    }
    let labels = label_3d(classes.view(), connectivity);
    let exterior = labels.data()[(0, 0, 0)];

    let mut ans = classes.to_owned();
    ndarray::Zip::from(&mut ans)
        .and(labels.data())
        .for_each(|p, &l| {
            if l == exterior {
                *p = class::EXTERIOR;
            }
        });
    log::debug!(
        "体外区域: 标签 {exterior} / {} 个连通域",
        labels.count()
    );
    Ok(ans)
}

/// 对单个水平切片就地进行空洞填充.
///
/// 非空气像素 (组织和体外视为同一类别) 按 `connectivity` 规则划分区域,
/// 除最大区域外, 其余区域中的组织像素被改为空气. 体外像素始终保持不变.
///
/// 如果以此法修改了切片则返回 `true`, 否则返回 `false`.
pub fn fill_slice(mut slice: ArrayViewMut2<u8>, connectivity: Connectivity2d) -> bool {
    let non_air = slice.map(|&p| class::is_non_air(p));
    let (labels, count) = label_2d(non_air.view(), connectivity, Some(false));
    if count <= 1 {
        return false;
    }

    let counts = crate::label::label_counts(labels.iter(), count);
    let Some(keep) = largest_label(&counts, BACKGROUND_LABEL) else {
        return false;
    };
    let mut changed = false;
    ndarray::Zip::from(&mut slice)
        .and(&labels)
        .for_each(|p, &l| {
            if *p == class::TISSUE && l != BACKGROUND_LABEL && l != keep {
                *p = class::AIR;
                changed = true;
            }
        });
    changed
}

/// 逐切片空洞填充, 返回新的数组. 各切片互相独立.
pub fn fill_slices(classes: ArrayView3<u8>, connectivity: Connectivity2d) -> Array3<u8> {
    let mut ans = classes.to_owned();
    let changed = ans
        .axis_iter_mut(Axis(0))
        .map(|s| fill_slice(s, connectivity))
        .filter(|&c| c)
        .count();
    log::debug!("空洞填充: {changed} / {} 个切片被修改", classes.len_of(Axis(0)));
    ans
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

/// 借助 `rayon`, 并行地进行逐切片空洞填充. 结果与 [`fill_slices`] 完全一致.
#[cfg(feature = "rayon")]
pub fn par_fill_slices(classes: ArrayView3<u8>, connectivity: Connectivity2d) -> Array3<u8> {
    let mut ans = classes.to_owned();
    let changed = AtomicUsize::new(0);
    ans.axis_iter_mut(Axis(0)).into_par_iter().for_each(|s| {
        if fill_slice(s, connectivity) {
            changed.fetch_add(1, Ordering::Release);
        }
    });
    log::debug!(
        "空洞填充 (并行): {} / {} 个切片被修改",
        changed.load(Ordering::Acquire),
        classes.len_of(Axis(0))
    );
    ans
}

/// 以空气为前景做 3D 连通域标记, 只保留体素最多的一个连通域.
///
/// 返回二值掩膜 (`mask::LUNG` / `mask::BACKGROUND`) 和保留的体素数.
/// 不存在空气体素时返回全背景掩膜和 `None`.
pub fn keep_largest(
    classes: ArrayView3<u8>,
    connectivity: Connectivity3d,
) -> (Array3<u8>, Option<usize>) {
    let air = classes.map(|&p| class::is_air(p));
    let labels = label_3d_with_background(air.view(), connectivity, false);
    let counts = labels.counts();
    let Some(keep) = largest_label(&counts, BACKGROUND_LABEL) else {
        return (Array3::zeros(classes.dim()), None);
    };
    log::debug!(
        "全局连通域: 保留标签 {keep} ({} 体素) / {} 个连通域",
        counts[keep as usize],
        labels.count()
    );
    let mask = labels
        .data()
        .map(|&l| if l == keep { mask::LUNG } else { mask::BACKGROUND });
    (mask, Some(counts[keep as usize]))
}

#[cfg(feature = "rayon")]
#[inline]
fn fill_stage(classes: ArrayView3<u8>, connectivity: Connectivity2d) -> Array3<u8> {
    par_fill_slices(classes, connectivity)
}

#[cfg(not(feature = "rayon"))]
#[inline]
fn fill_stage(classes: ArrayView3<u8>, connectivity: Connectivity2d) -> Array3<u8> {
    fill_slices(classes, connectivity)
}

/// 检查两个阶段之间的形状一致.
fn ensure_same_shape(expected: &Array3<u8>, found: &Array3<u8>) -> LungResult<()> {
    if expected.shape() == found.shape() {
        Ok(())
    } else {
        Err(LungError::shape_mismatch(expected.shape(), found.shape()))
    }
}

/// 执行完整的分割流程, 并保留所有中间结果.
pub fn segment_stages(scan: &CtVolume, params: &SegmentParams) -> LungResult<Stages> {
    if scan.size() == 0 {
        return Err(LungError::EmptyVolume);
    }
    let binary = binarize(scan.data(), params.threshold);
    let exterior_removed = remove_exterior(binary.view(), params.connectivity)?;
    ensure_same_shape(&binary, &exterior_removed)?;

    let filled = if params.fill_lung_structures {
        fill_stage(exterior_removed.view(), params.slice_connectivity)
    } else {
        exterior_removed.clone()
    };
    ensure_same_shape(&exterior_removed, &filled)?;

    let (mask, kept) = keep_largest(filled.view(), params.connectivity);
    ensure_same_shape(&filled, &mask)?;

    Ok(Stages {
        binary,
        exterior_removed,
        filled,
        mask,
        kept,
    })
}

/// 分割肺部掩膜.
///
/// # 返回值
///
/// - 扫描为空时返回 `Err(LungError::EmptyVolume)`;
/// - 不存在任何肺内部候选体素时返回 `Ok(Segmentation::NoForeground)`, 掩膜为全背景;
/// - 其他情况下返回 `Ok(Segmentation::Lungs)`.
pub fn segment_lung_mask(scan: &CtVolume, params: &SegmentParams) -> LungResult<Segmentation> {
    let geometry = *scan.geometry();
    let stages = segment_stages(scan, params)?;
    match stages.kept {
        Some(n) => {
            let lung = LungMask::from_parts(stages.mask, geometry);
            log::info!("肺部分割完成: {n} 体素, {:.1} mL", lung.volume_ml());
            Ok(Segmentation::Lungs(lung))
        }
        None => {
            log::info!("肺部分割完成: 未找到肺内部候选体素");
            Ok(Segmentation::NoForeground(LungMask::empty(
                scan.shape(),
                geometry,
            )))
        }
    }
}
