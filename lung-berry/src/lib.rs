#![warn(missing_docs)]

//! 核心库. 将 3D CT 扫描转换为肺部二值掩膜, 并进一步提取为可供渲染的三角网格.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 所有 3D 数据均按照 `(z, H, W)` 组织, 其中 `z` 为主扫描方向 (相邻水平切片方向).
//! 2. 体素间距 (spacing) 同样按照 `[z, H, W]` 顺序保存, 以毫米为单位.
//! 3. 网格顶点坐标为物理坐标 `[x, y, z] = [w * width_mm, h * height_mm, z * z_mm]`,
//!   而不是体素索引.
//! 4. 分割算法针对常见的水平 (axial) 扫描方向设计: 体数据的 `(0, 0, 0)`
//!   角点被认定为体外空气. 其它扫描方向需要调用者自行调整数据方向.
//!
//! # 开发计划
//!
//! ### HU 标定 ✅
//!
//! 线性 rescale (slope/intercept), 并将扫描范围外的哨兵值 (-2000) 置零.
//!
//! 实现位于 `lung-berry/src/hounsfield.rs`.
//!
//! ### 连通域标记 ✅
//!
//! 3D 6-/26-邻接, 2D 4-/8-邻接. 基于显式工作队列和扁平索引, 不存在递归深度问题.
//!
//! 实现位于 `lung-berry/src/label`.
//!
//! ### 肺部掩膜分割 ✅
//!
//! 阈值化 -> 体外空气移除 -> 逐切片空洞填充 -> 全局最大连通域.
//! 逐切片填充可以借助 `rayon` 并行.
//!
//! 实现位于 `lung-berry/src/segment`.
//!
//! ### 等值面提取 ✅
//!
//! Marching cubes. 拓扑情形表在首次使用时由立方体的面结构推导生成,
//! 保证相邻立方体之间的网格无缝.
//!
//! 实现位于 `lung-berry/src/surface`.
//!
//! ### 网格平滑与导出 ✅
//!
//! Taubin 平滑; ASCII STL 和 Wavefront OBJ 导出.
//!
//! 实现位于 `lung-berry/src/surface/smooth.rs` 和 `lung-berry/src/export.rs`.
//!
//! ### 从 DICOM 目录直接加载 ⌛️
//!
//! 目前只支持 NIfTI 文件, 以及由调用者自行构造的原始数组.

/// 二维索引 `(h, w)`.
pub type Idx2d = (usize, usize);

/// 三维索引 `(z, h, w)`.
pub type Idx3d = (usize, usize, usize);

/// 三维物理坐标 / 向量.
pub type Vec3 = [f64; 3];

pub mod consts;

mod data;

pub use data::{CtVolume, Geometry, LungMask, RawVolume, VoxelGeometry};

mod error;

pub use error::{LungError, LungResult};

pub mod export;

pub mod hounsfield;

pub use hounsfield::Rescale;

pub mod label;

pub use label::LabelVolume;

pub mod pipeline;

pub mod prelude;

pub mod segment;

pub mod surface;

pub use surface::Mesh;
