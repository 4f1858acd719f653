//! 🫁欢迎光临🫁
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d, Vec3};

pub use crate::data::{CtVolume, Geometry, LungMask, RawVolume, VoxelGeometry};
pub use crate::hounsfield::Rescale;
pub use crate::{LungError, LungResult};

pub use crate::consts::{class, hu, mask, BACKGROUND_LABEL};

pub use crate::label::{Connectivity2d, Connectivity3d, LabelVolume};
pub use crate::segment::{segment_lung_mask, SegmentParams, Segmentation};
pub use crate::surface::{extract_labels, marching_cubes, IndexedMesh, Mesh, SmoothParams};

pub use crate::export::MeshWrite;
pub use crate::pipeline::{lung_surface, lung_surface_hu, LungSurface, PipelineParams};
