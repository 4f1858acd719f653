//! 合成胸腔体模上的端到端测试.

use lung_berry::consts::hu::OUT_OF_SCAN;
use lung_berry::label::label_3d_with_background;
use lung_berry::prelude::*;
use lung_berry::segment::segment_stages;
use ndarray::{s, Array3};

const SHAPE: (usize, usize, usize) = (16, 40, 48);

const LUNG_HU: f32 = -850.0;
const TISSUE_HU: f32 = 40.0;
const AIR_HU: f32 = -1000.0;

/// 两侧肺 (12 x 20 x 12) 各 2880 体素, 支气管 64 体素,
/// 左肺中的血管 24 体素, 右肺中的结节 27 体素.
const LUNG_AIR_VOXELS: usize = 2880 * 2 + 64 - 24 - 27;
const LUNG_FILLED_VOXELS: usize = 2880 * 2 + 64;

fn init_logger() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init();
}

/// HU 值体模: 体外空气, 软组织躯干, 由支气管相连的两侧肺,
/// 肺内的血管和结节, 以及躯干内孤立的小气泡.
fn phantom_hu() -> Array3<f32> {
    let mut v = Array3::from_elem(SHAPE, AIR_HU);
    v.slice_mut(s![.., 4..36, 4..44]).fill(TISSUE_HU);

    // 左肺, 右肺, 支气管.
    v.slice_mut(s![2..14, 10..30, 8..20]).fill(LUNG_HU);
    v.slice_mut(s![2..14, 10..30, 28..40]).fill(LUNG_HU);
    v.slice_mut(s![10..12, 18..22, 20..28]).fill(LUNG_HU);

    // 血管, 结节.
    v.slice_mut(s![4..10, 18..20, 13..15]).fill(TISSUE_HU);
    v.slice_mut(s![6..9, 14..17, 32..35]).fill(TISSUE_HU);

    // 气泡.
    v.slice_mut(s![1..3, 32..34, 22..24]).fill(AIR_HU);
    v
}

/// 以 `intercept = -1024` 存储的原始体模, 圆形视野外为哨兵值.
fn phantom_raw() -> RawVolume {
    let hu = phantom_hu();
    let raw = Array3::from_shape_fn(SHAPE, |(z, h, w)| {
        let (dh, dw) = (h as f64 - 20.0, w as f64 - 24.0);
        if dh * dh + dw * dw > 26.0 * 26.0 {
            OUT_OF_SCAN
        } else {
            (hu[(z, h, w)] + 1024.0) as i16
        }
    });
    let geometry = Geometry::new([2.0, 1.0, 1.0]).unwrap();
    RawVolume::new(raw, geometry, Rescale::new(1.0, -1024.0).unwrap()).unwrap()
}

#[test]
fn test_raw_phantom_calibration() {
    let raw = phantom_raw();
    let ct = raw.to_hu();
    assert_eq!(ct[(0, 0, 0)], -1024.0);
    assert_eq!(ct[(5, 20, 10)], LUNG_HU);
    assert_eq!(ct[(5, 5, 5)], TISSUE_HU);
    assert_eq!(raw.data()[(0, 0, 0)], OUT_OF_SCAN);
}

#[test]
fn test_segment_with_fill() {
    init_logger();
    let ct = phantom_raw().to_hu();
    let seg = segment_lung_mask(&ct, &SegmentParams::default()).unwrap();
    assert!(seg.has_foreground());

    let mask = seg.mask();
    assert_eq!(mask.count(), LUNG_FILLED_VOXELS);
    // 血管和结节被并入肺部, 气泡和体外区域不属于肺部.
    assert_eq!(mask[(5, 18, 13)], mask::LUNG);
    assert_eq!(mask[(7, 15, 33)], mask::LUNG);
    assert_eq!(mask[(1, 32, 22)], mask::BACKGROUND);
    assert_eq!(mask[(0, 0, 0)], mask::BACKGROUND);
    approx::assert_relative_eq!(mask.volume_ml(), LUNG_FILLED_VOXELS as f64 * 2.0 / 1000.0);
}

#[test]
fn test_segment_without_fill() {
    let ct = phantom_raw().to_hu();
    let seg = segment_lung_mask(&ct, &SegmentParams::without_fill()).unwrap();
    let mask = seg.mask();
    assert_eq!(mask.count(), LUNG_AIR_VOXELS);
    assert_eq!(mask[(5, 18, 13)], mask::BACKGROUND);
    assert_eq!(mask[(5, 18, 12)], mask::LUNG);
}

#[test]
fn test_disconnected_lungs_keep_the_larger() {
    let mut hu = phantom_hu();
    // 去掉支气管, 并让右肺更小.
    hu.slice_mut(s![10..12, 18..22, 20..28]).fill(TISSUE_HU);
    hu.slice_mut(s![2..14, 10..12, 28..40]).fill(TISSUE_HU);
    let ct = CtVolume::new(hu, Geometry::unit()).unwrap();
    let mask = segment_lung_mask(&ct, &SegmentParams::default())
        .unwrap()
        .into_mask();
    assert_eq!(mask.count(), 2880);
    assert_eq!(mask[(5, 20, 30)], mask::BACKGROUND);
}

#[test]
fn test_stage_snapshots() {
    let ct = CtVolume::new(phantom_hu(), Geometry::unit()).unwrap();
    let st = segment_stages(&ct, &SegmentParams::default()).unwrap();

    assert_eq!(st.binary[(5, 18, 13)], class::TISSUE);
    assert_eq!(st.exterior_removed[(5, 18, 13)], class::TISSUE);
    assert_eq!(st.exterior_removed[(0, 0, 0)], class::EXTERIOR);
    assert_eq!(st.filled[(5, 18, 13)], class::AIR);
    // 气泡在逐切片填充后仍是空气, 由全局最大连通域去除.
    assert_eq!(st.filled[(1, 32, 22)], class::AIR);
    assert_eq!(st.mask[(1, 32, 22)], mask::BACKGROUND);
    assert_eq!(st.kept, Some(LUNG_FILLED_VOXELS));
}

#[test]
fn test_lung_surface_pipeline() {
    init_logger();
    let raw = phantom_raw();
    let out = lung_surface(&raw, &PipelineParams::default()).unwrap();

    assert_eq!(out.mask().count(), LUNG_FILLED_VOXELS);
    assert_eq!(out.masked[(0, 0, 0)], hu::MASKED_OUT);
    assert_eq!(out.masked[(5, 20, 10)], LUNG_HU);
    // 被并入掩膜的血管保持原 HU 值.
    assert_eq!(out.masked[(5, 18, 13)], TISSUE_HU);

    let idx = out.mesh.to_indexed();
    assert!(!out.mesh.is_empty());
    assert!(idx.is_closed());
    // 肺的外表面, 血管和结节的表面: 三个互不相交的球面拓扑.
    assert_eq!(idx.euler_characteristic(), 6);

    // 法向指向肺外: 有向体积为正, 且接近肺内空气的体积.
    let air_mm3 = LUNG_AIR_VOXELS as f64 * 2.0;
    let volume = out.mesh.signed_volume();
    assert!(volume > 0.8 * air_mm3 && volume < 1.2 * air_mm3, "{volume}");

    let (lo, hi) = out.mesh.bounds().unwrap();
    // x 方向 (W) 覆盖两侧肺, z 方向按 2 mm 层厚缩放.
    assert!(lo[0] > 7.0 && lo[0] < 8.0);
    assert!(hi[0] > 39.0 && hi[0] < 40.0);
    assert!(lo[2] > 2.0 && lo[2] < 4.0);
    assert!(hi[2] > 26.0 && hi[2] < 28.0);
}

#[test]
fn test_pipeline_is_deterministic() {
    let raw = phantom_raw();
    let params = PipelineParams {
        smooth: Some(SmoothParams::with_iterations(3)),
        ..Default::default()
    };
    let a = lung_surface(&raw, &params).unwrap();
    let b = lung_surface(&raw, &params).unwrap();
    assert_eq!(a.mask(), b.mask());
    assert_eq!(a.mesh, b.mesh);
}

#[test]
fn test_pipeline_without_lungs() {
    let mut hu = Array3::from_elem((6, 10, 10), AIR_HU);
    hu.slice_mut(s![.., 2..8, 2..8]).fill(TISSUE_HU);
    let ct = CtVolume::new(hu, Geometry::unit()).unwrap();
    let out = lung_surface_hu(&ct, &PipelineParams::default()).unwrap();
    assert!(matches!(out.segmentation, Segmentation::NoForeground(_)));
    assert!(out.mesh.is_empty());
    assert!(out.masked.data().iter().all(|&v| v == hu::MASKED_OUT));
}

#[test]
fn test_mask_is_single_component() {
    let ct = phantom_raw().to_hu();
    let mask = segment_lung_mask(&ct, &SegmentParams::default())
        .unwrap()
        .into_mask();
    let labels = label_3d_with_background(mask.data(), Connectivity3d::Face, mask::BACKGROUND);
    assert_eq!(labels.count(), 1);
}

#[test]
fn test_export_lung_mesh() {
    let out = lung_surface(&phantom_raw(), &PipelineParams::default()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let stl = dir.path().join("lung.stl");
    let obj = dir.path().join("lung.obj");
    out.mesh.save_stl(&stl).unwrap();
    out.mesh.save_obj(&obj).unwrap();

    let text = std::fs::read_to_string(&stl).unwrap();
    assert_eq!(text.matches("endfacet").count(), out.mesh.len());
    let text = std::fs::read_to_string(&obj).unwrap();
    assert_eq!(
        text.lines().filter(|l| l.starts_with("f ")).count(),
        out.mesh.len()
    );
}

#[test]
fn test_open_missing_file() {
    assert!(CtVolume::open("/nonexistent/scan.nii.gz").is_err());
    assert!(LabelVolume::open("/nonexistent/label.nii").is_err());
}
