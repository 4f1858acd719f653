use std::ops::Index;
use std::path::Path;

use ndarray::{Array3, ArrayD, ArrayView2, ArrayView3, Axis, Ix3, ShapeBuilder};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::consts::{hu, mask};
use crate::hounsfield::Rescale;
use crate::{Idx2d, Idx3d, LungError, LungResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 体数据的几何信息: 体素间距和 (透传的) 原点/方向.
///
/// 核心算法只会读取 `spacing`. `origin` 和 `affine` 由加载器给出,
/// 原样携带到所有派生数据上, 不会被重新计算.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Geometry {
    /// 体素间距 `[z, H, W]`, 以毫米为单位.
    spacing: [f64; 3],

    /// 世界坐标系中的原点 `[x, y, z]`.
    pub origin: [f64; 3],

    /// NIfTI sform 仿射矩阵的前三行 (若有).
    pub affine: Option<[[f64; 4]; 3]>,
}

impl Geometry {
    /// 以 `[z, H, W]` 顺序的体素间距构建几何信息. 原点为 0, 无仿射矩阵.
    ///
    /// 任一间距非正或不是有限值时返回 `Err(LungError::InvalidSpacing)`.
    pub fn new(spacing: [f64; 3]) -> LungResult<Self> {
        if spacing.iter().all(|s| s.is_finite() && *s > 0.0) {
            Ok(Self {
                spacing,
                origin: [0.0; 3],
                affine: None,
            })
        } else {
            Err(LungError::InvalidSpacing(spacing))
        }
    }

    /// 各向同性的单位间距.
    #[inline]
    pub const fn unit() -> Self {
        Self {
            spacing: [1.0; 3],
            origin: [0.0; 3],
            affine: None,
        }
    }

    /// 体素间距 `[z, H, W]`.
    #[inline]
    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    /// 从 NIfTI header 中读取几何信息. `pixdim` 按 `[W, H, z]` 存储.
    pub fn from_header(h: &NiftiHeader) -> LungResult<Self> {
        let [_, w, hh, z, ..] = h.pixdim;
        let mut ans = Self::new([z as f64, hh as f64, w as f64])?;
        ans.origin = [h.quatern_x as f64, h.quatern_y as f64, h.quatern_z as f64];
        if h.sform_code > 0 {
            ans.affine = Some([h.srow_x, h.srow_y, h.srow_z].map(|row| row.map(f64::from)));
        }
        Ok(ans)
    }
}

impl Default for Geometry {
    #[inline]
    fn default() -> Self {
        Self::unit()
    }
}

/// 3D 体数据的共用几何属性和部分通用操作.
pub trait VoxelGeometry {
    /// 获取几何信息.
    fn geometry(&self) -> &Geometry;

    /// 获取数据形状大小 `(z, H, W)`.
    fn shape(&self) -> Idx3d;

    /// 获取数据水平切片形状大小.
    #[inline]
    fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取水平切片个数.
    #[inline]
    fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 检查索引是否合法.
    #[inline]
    fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }

    /// 获取单个体素分辨率, 以毫米为单位, 顺序为 `[z, H, W]`.
    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        self.geometry().spacing
    }

    /// 获取 width 方向体素分辨率, 以毫米为单位.
    #[inline]
    fn width_mm(&self) -> f64 {
        self.pix_dim()[2]
    }

    /// 获取 height 方向体素分辨率, 以毫米为单位.
    #[inline]
    fn height_mm(&self) -> f64 {
        self.pix_dim()[1]
    }

    /// 获取空间方向 (相邻 2D 切片的方向) 体素分辨率, 以毫米为单位.
    #[inline]
    fn z_mm(&self) -> f64 {
        self.pix_dim()[0]
    }

    /// 体素分辨率在三个维度上是否是各向同的?
    #[inline]
    fn is_isotropic(&self) -> bool {
        let [z, h, w] = self.pix_dim();
        z == h && z == w
    }

    /// 获取体素的实际体积值, 以立方毫米为单位.
    #[inline]
    fn voxel(&self) -> f64 {
        self.pix_dim().iter().product()
    }
}

/// 将 (W, H, z) 转换成 (z, H, W). 以后均按照该模式访问.
#[inline]
fn shape_from_header(h: &NiftiHeader) -> Idx3d {
    let [_, w, h, z, ..] = h.dim;
    (z as usize, h as usize, w as usize)
}

/// 读取 nii 文件, 返回 header 和 `(z, H, W)` 排列的数据.
fn read_nifti<P: AsRef<Path>>(path: P) -> LungResult<(NiftiHeader, Array3<f32>)> {
    let obj = ReaderOptions::new().read_file(path.as_ref())?;
    let header = obj.header().clone();

    // [W, H, z] -> [z, H, W].
    let data = obj
        .into_volume()
        .into_ndarray::<f32>()?
        .permuted_axes([2, 1, 0].as_slice());
    let data = data
        .into_dimensionality::<Ix3>()
        .map_err(|_| LungError::shape_mismatch(&[3], &[header.dim[0] as usize]))?;

    let sh = shape_from_header(&header);
    if data.dim() != sh {
        let (z, h, w) = data.dim();
        return Err(LungError::shape_mismatch(&[sh.0, sh.1, sh.2], &[z, h, w]));
    }
    Ok((header, data.as_standard_layout().into_owned()))
}

/// 检查 3D 数据不为空.
#[inline]
fn check_non_empty((z, h, w): Idx3d) -> LungResult<()> {
    if z * h * w == 0 {
        Err(LungError::EmptyVolume)
    } else {
        Ok(())
    }
}

/// 尚未标定的原始 3D 扫描, 即传感器给出的有符号 16 位整数, 加上 rescale 参数.
///
/// 该结构由外部加载器 (如 DICOM 序列读取器) 构造.
#[derive(Debug, Clone)]
pub struct RawVolume {
    data: Array3<i16>,
    geometry: Geometry,
    rescale: Rescale,
}

impl RawVolume {
    /// 直接创建原始体数据. 数据为空时返回 `Err(LungError::EmptyVolume)`.
    pub fn new(data: Array3<i16>, geometry: Geometry, rescale: Rescale) -> LungResult<Self> {
        check_non_empty(data.dim())?;
        Ok(Self {
            data,
            geometry,
            rescale,
        })
    }

    /// 由任意维度的数组创建. 若数组不是三维的则返回 `Err(LungError::ShapeMismatch)`.
    pub fn from_dyn(data: ArrayD<i16>, geometry: Geometry, rescale: Rescale) -> LungResult<Self> {
        let found = data.shape().to_vec();
        let data = data
            .into_dimensionality::<Ix3>()
            .map_err(|_| LungError::shape_mismatch(&[0; 3], &found))?;
        Self::new(data, geometry, rescale)
    }

    /// 由行优先的扁平数据创建. 长度与 `shape` 不符时返回 `Err(LungError::ShapeMismatch)`.
    pub fn from_shape_vec(
        shape: Idx3d,
        raw: Vec<i16>,
        geometry: Geometry,
        rescale: Rescale,
    ) -> LungResult<Self> {
        let len = raw.len();
        let data = Array3::from_shape_vec(shape, raw)
            .map_err(|_| LungError::shape_mismatch(&[shape.0 * shape.1 * shape.2], &[len]))?;
        Self::new(data, geometry, rescale)
    }

    /// 打开以 int16 存储的 nii 文件, 保留未标定的原始整数,
    /// rescale 参数取自 header 的 `scl_slope`/`scl_inter`.
    ///
    /// 存储类型不是 int16 时返回 `Err(LungError::Nifti)`.
    pub fn open<P: AsRef<Path>>(path: P) -> LungResult<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = obj.header().clone();
        let (z, h, w) = shape_from_header(&header);
        let raw = obj.into_volume().into_nifti_typed_data::<i16>()?;

        // nii 按列优先存储 [W, H, z], 反转轴序即为 (z, H, W).
        let len = raw.len();
        let data = Array3::from_shape_vec((w, h, z).f(), raw)
            .map_err(|_| LungError::shape_mismatch(&[w * h * z], &[len]))?
            .reversed_axes();
        Self::new(
            data.as_standard_layout().into_owned(),
            Geometry::from_header(&header)?,
            Rescale::from_header(&header)?,
        )
    }

    /// rescale 参数.
    #[inline]
    pub fn rescale(&self) -> Rescale {
        self.rescale
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, i16> {
        self.data.view()
    }

    /// 标定为 HU 值. 原始数据不会被修改.
    #[inline]
    pub fn to_hu(&self) -> CtVolume {
        CtVolume {
            data: self.rescale.to_hu(self.data.view()),
            geometry: self.geometry,
        }
    }
}

impl VoxelGeometry for RawVolume {
    #[inline]
    fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }
}

/// 标定后的 3D CT 扫描. HU 值以 `f32` 保存.
#[derive(Debug, Clone)]
pub struct CtVolume {
    data: Array3<f32>,
    geometry: Geometry,
}

impl CtVolume {
    /// 直接创建. 数据为空时返回 `Err(LungError::EmptyVolume)`.
    pub fn new(data: Array3<f32>, geometry: Geometry) -> LungResult<Self> {
        check_non_empty(data.dim())?;
        Ok(Self { data, geometry })
    }

    /// 打开 nii 文件格式的 3D CT 扫描. NIfTI 的 `scl_slope`/`scl_inter`
    /// 在读取时已经被应用, 因此结果直接是 HU 值.
    ///
    /// # 注意
    ///
    /// 这里不会处理扫描范围外的哨兵值. 需要按 [`Rescale`] 的规则标定时,
    /// 应使用 [`RawVolume::open`] 再调用 [`RawVolume::to_hu`].
    pub fn open<P: AsRef<Path>>(path: P) -> LungResult<Self> {
        let (header, data) = read_nifti(path)?;
        Self::new(data, Geometry::from_header(&header)?)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array3<f32> {
        self.data
    }
}

impl VoxelGeometry for CtVolume {
    #[inline]
    fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }
}

impl Index<Idx3d> for CtVolume {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

/// 肺部二值掩膜. 体素值只能是 `mask::BACKGROUND` 或 `mask::LUNG`.
#[derive(Debug, Clone, PartialEq)]
pub struct LungMask {
    data: Array3<u8>,
    geometry: Geometry,
}

impl LungMask {
    /// 由分割阶段直接构建. 调用者保证数据只含 0 和 1.
    #[inline]
    pub(crate) fn from_parts(data: Array3<u8>, geometry: Geometry) -> Self {
        debug_assert!(data.iter().all(|&p| p <= mask::LUNG));
        Self { data, geometry }
    }

    /// 全背景掩膜.
    #[inline]
    pub(crate) fn empty(shape: Idx3d, geometry: Geometry) -> Self {
        Self {
            data: Array3::zeros(shape),
            geometry,
        }
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, u8> {
        self.data.view()
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array3<u8> {
        self.data
    }

    /// 获取能按升序迭代水平切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ArrayView2<'_, u8>> {
        self.data.axis_iter(Axis(0))
    }

    /// 肺部体素个数.
    #[inline]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&p| p == mask::LUNG).count()
    }

    /// 掩膜是否为全背景?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&p| p == mask::BACKGROUND)
    }

    /// 肺部实际体积, 以毫升 (立方厘米) 为单位.
    #[inline]
    pub fn volume_ml(&self) -> f64 {
        self.count() as f64 * self.voxel() / 1000.0
    }

    /// 每个水平切片上的肺部像素个数.
    pub fn slice_counts(&self) -> Vec<usize> {
        self.slice_iter()
            .map(|s| s.iter().filter(|&&p| p == mask::LUNG).count())
            .collect()
    }

    /// 用掩膜遮蔽扫描: 掩膜外的体素被置为 `hu::MASKED_OUT`, 掩膜内保持原值.
    /// 原扫描不会被修改.
    ///
    /// 形状不一致时返回 `Err(LungError::ShapeMismatch)`.
    pub fn apply_to(&self, scan: &CtVolume) -> LungResult<CtVolume> {
        if self.shape() != scan.shape() {
            let (a, b) = (self.shape(), scan.shape());
            return Err(LungError::shape_mismatch(&[a.0, a.1, a.2], &[b.0, b.1, b.2]));
        }
        let mut data = scan.data.clone();
        ndarray::Zip::from(&mut data)
            .and(&self.data)
            .for_each(|v, &m| {
                if m != mask::LUNG {
                    *v = hu::MASKED_OUT;
                }
            });
        Ok(CtVolume {
            data,
            geometry: scan.geometry,
        })
    }
}

impl VoxelGeometry for LungMask {
    #[inline]
    fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }
}

impl Index<Idx3d> for LungMask {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}
