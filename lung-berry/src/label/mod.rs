//! 连通域标记与最大连通域选取.
//!
//! 两个体素属于同一个连通域, 当且仅当存在一条按照给定邻接规则相连的路径,
//! 且路径上所有体素的类别相同. 背景类别的体素一律标记为 [`BACKGROUND_LABEL`].
//! 标签只是不透明的标识符, 仅在单次调用内有意义.

mod flood;

use std::path::Path;

use ndarray::{Array2, Array3, ArrayView2, ArrayView3};

use self::flood::{Flood, Offset};
use crate::consts::BACKGROUND_LABEL;
use crate::data::Geometry;
use crate::{Idx3d, LungError, LungResult, VoxelGeometry};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 3D 邻接规则.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Connectivity3d {
    /// 共面 (6-邻接), 即前后上下左右.
    #[default]
    Face,

    /// 共点 (26-邻接).
    Full,
}

/// 2D 邻接规则.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Connectivity2d {
    /// 共边 (4-邻接).
    #[default]
    Edge,

    /// 共点 (8-邻接).
    Full,
}

const N6: [Offset; 6] = [
    (-1, 0, 0),
    (1, 0, 0),
    (0, -1, 0),
    (0, 1, 0),
    (0, 0, -1),
    (0, 0, 1),
];

const N4: [Offset; 4] = [(0, -1, 0), (0, 1, 0), (0, 0, -1), (0, 0, 1)];

const N8: [Offset; 8] = [
    (0, -1, -1),
    (0, -1, 0),
    (0, -1, 1),
    (0, 0, -1),
    (0, 0, 1),
    (0, 1, -1),
    (0, 1, 0),
    (0, 1, 1),
];

/// 26 个共点邻居偏移.
const N26: [Offset; 26] = {
    let mut ans = [(0, 0, 0); 26];
    let mut i = 0usize;
    let mut code = 0isize;
    while code < 27 {
        if code != 13 {
            ans[i] = (code / 9 - 1, (code / 3) % 3 - 1, code % 3 - 1);
            i += 1;
        }
        code += 1;
    }
    ans
};

impl Connectivity3d {
    #[inline]
    fn offsets(&self) -> &'static [Offset] {
        match self {
            Self::Face => &N6,
            Self::Full => &N26,
        }
    }
}

impl Connectivity2d {
    #[inline]
    fn offsets(&self) -> &'static [Offset] {
        match self {
            Self::Edge => &N4,
            Self::Full => &N8,
        }
    }
}

/// 3D 标签体数据, 与源数据形状一致.
///
/// 标签 0 为背景, 其余标签为 `1..=count` 的连续整数.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVolume {
    data: Array3<u32>,
    count: u32,
    geometry: Geometry,
}

impl LabelVolume {
    /// 由任意标签数组创建, 例如来自外部分割工具的多标签文件.
    ///
    /// 与 [`label_3d`] 的输出不同, 这里不要求标签连续, 也不检查连通性.
    pub fn from_raw(data: Array3<u32>, geometry: Geometry) -> LungResult<Self> {
        if data.is_empty() {
            return Err(LungError::EmptyVolume);
        }
        let count = data.iter().copied().max().unwrap_or(BACKGROUND_LABEL);
        Ok(Self {
            data,
            count,
            geometry,
        })
    }

    /// 打开 nii 格式的多标签文件. 标签值按最近整数取整, 负值视为背景.
    pub fn open<P: AsRef<Path>>(path: P) -> LungResult<Self> {
        let scan = crate::CtVolume::open(path)?;
        let geometry = *scan.geometry();
        let data = scan
            .into_raw()
            .mapv(|v| if v > 0.0 { v.round() as u32 } else { BACKGROUND_LABEL });
        Self::from_raw(data, geometry)
    }

    /// 标签总数 (最大标签值), 不含背景.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, u32> {
        self.data.view()
    }

    /// 每个标签的体素个数, 以标签值为下标 (包括背景标签 0).
    pub fn counts(&self) -> Vec<usize> {
        label_counts(self.data.view(), self.count)
    }

    /// 数据中实际出现的非背景标签, 升序.
    pub fn present_labels(&self) -> Vec<u32> {
        self.counts()
            .into_iter()
            .enumerate()
            .skip(1)
            .filter_map(|(l, c)| (c > 0).then_some(l as u32))
            .collect()
    }

    /// 在不计 `background` 的情况下, 体素数最多的标签.
    #[inline]
    pub fn largest(&self, background: u32) -> Option<u32> {
        largest_label(&self.counts(), background)
    }
}

impl VoxelGeometry for LabelVolume {
    #[inline]
    fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }
}

/// 按照 `connectivity` 规则标记 3D 数据的连通域, 不设背景类别.
/// 每个体素 (无论何种类别) 都会得到一个正标签.
#[inline]
pub fn label_3d<T: Copy + PartialEq>(
    classes: ArrayView3<T>,
    connectivity: Connectivity3d,
) -> LabelVolume {
    label_3d_impl(classes, connectivity, None)
}

/// 按照 `connectivity` 规则标记 3D 数据的连通域. 类别为 `background` 的体素被标记为 0.
#[inline]
pub fn label_3d_with_background<T: Copy + PartialEq>(
    classes: ArrayView3<T>,
    connectivity: Connectivity3d,
    background: T,
) -> LabelVolume {
    label_3d_impl(classes, connectivity, Some(background))
}

fn label_3d_impl<T: Copy + PartialEq>(
    classes: ArrayView3<T>,
    connectivity: Connectivity3d,
    background: Option<T>,
) -> LabelVolume {
    let (z, h, w) = classes.dim();
    let classes = classes.as_standard_layout();
    let Some(flat) = classes.as_slice() else {
        unreachable!()
    };
    let (labels, count) = Flood::new(flat, [z, h, w], connectivity.offsets(), background).run();

    // 该操作不会生成 `Err`, 可直接 unwrap.
    let data = Array3::from_shape_vec((z, h, w), labels).unwrap();
    log::trace!("3D 连通域标记: 形状 {:?}, {count} 个连通域", (z, h, w));
    LabelVolume {
        data,
        count,
        geometry: Geometry::unit(),
    }
}

/// 按照 `connectivity` 规则标记 2D 切片的连通域. 类别为 `background` 的像素被标记为 0.
///
/// 返回标签数组和标签总数 (不含 0).
pub fn label_2d<T: Copy + PartialEq>(
    classes: ArrayView2<T>,
    connectivity: Connectivity2d,
    background: Option<T>,
) -> (Array2<u32>, u32) {
    let (h, w) = classes.dim();
    let classes = classes.as_standard_layout();
    let Some(flat) = classes.as_slice() else {
        unreachable!()
    };
    let (labels, count) = Flood::new(flat, [1, h, w], connectivity.offsets(), background).run();
    (Array2::from_shape_vec((h, w), labels).unwrap(), count)
}

/// 统计每个标签的体素个数. 返回值长度为 `count + 1`, 以标签值为下标.
///
/// 如果存在大于 `count` 的标签, 则程序 panic.
pub fn label_counts<'a, I>(labels: I, count: u32) -> Vec<usize>
where
    I: IntoIterator<Item = &'a u32>,
{
    let mut ans = vec![0usize; count as usize + 1];
    for &l in labels {
        ans[l as usize] += 1;
    }
    ans
}

/// 在 `counts` (以标签值为下标的体素数) 中选出不计 `background` 时体素数最多的标签.
///
/// 若不存在非背景标签 (或它们都没有体素), 返回 `None`.
/// 多个标签体素数相同时, 返回其中最小的标签.
pub fn largest_label(counts: &[usize], background: u32) -> Option<u32> {
    let mut best: Option<(u32, usize)> = None;
    for (l, &c) in counts.iter().enumerate() {
        let l = l as u32;
        if l == background || c == 0 {
            continue;
        }
        if best.map_or(true, |(_, bc)| c > bc) {
            best = Some((l, c));
        }
    }
    best.map(|(l, _)| l)
}
