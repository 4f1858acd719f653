//! 等值面提取 (marching cubes).
//!
//! 对每个由 8 个相邻体素构成的单元立方体, 按角点是否 `>= iso` 查表得到交线多边形,
//! 多边形顶点由棱两端的标量值线性插值得到, 最终三角化为网格.
//!
//! 顶点坐标是物理坐标 `[x, y, z] = [w * W_mm, h * H_mm, z * z_mm]` (毫米),
//! 不含原点偏移, 不能再当作体素下标使用.

mod cases;
mod mesh;
mod smooth;

pub use mesh::{IndexedMesh, Mesh, Triangle};
pub use smooth::SmoothParams;

use itertools::Itertools;
use ndarray::{Array2, ArrayView2, ArrayView3, Axis};
use num::ToPrimitive;

use self::cases::{Polygon, CASES, CORNERS, EDGES, EDGE_AXIS};
use crate::{CtVolume, Geometry, LabelVolume, LungError, LungResult, Vec3, VoxelGeometry};

/// 多标签提取时, 指示函数 (属于该标签为 1, 否则为 0) 上的等值.
pub const INDICATOR_ISO: f64 = 0.5;

/// 标量转换为 `f64`. NaN 或无法表示的值视为低于任何等值,
/// 正负无穷被截断到有限范围内, 保证插值结果有限.
#[inline]
fn scalar<T: ToPrimitive>(v: &T) -> f64 {
    match v.to_f64() {
        Some(x) if !x.is_nan() => x.clamp(f64::MIN, f64::MAX),
        _ => f64::MIN,
    }
}

/// 标量范围 `(min, max)`.
fn scalar_range<T: ToPrimitive>(scalars: &ArrayView3<T>) -> (f64, f64) {
    scalars
        .iter()
        .map(scalar)
        .minmax_by(f64::total_cmp)
        .into_option()
        .unwrap_or((f64::INFINITY, f64::NEG_INFINITY))
}

/// 将多边形三角化, 追加到 `out`.
fn triangulate(poly: &Polygon, points: &[Vec3], out: &mut Vec<Triangle>) {
    let n = points.len();
    if poly.fan {
        for i in 1..n - 1 {
            out.push([points[0], points[i], points[i + 1]]);
        }
    } else {
        let mut c = [0.0; 3];
        for p in points {
            for i in 0..3 {
                c[i] += p[i] / n as f64;
            }
        }
        for i in 0..n {
            out.push([c, points[i], points[(i + 1) % n]]);
        }
    }
}

/// 处理第 `z` 层和第 `z + 1` 层切片之间的所有立方体.
///
/// `spacing` 为 `[x, y, z]` 即 `[W, H, z]` 方向的体素间距.
fn slab_triangles<'a>(
    lo: ArrayView2<'a, f64>,
    hi: ArrayView2<'a, f64>,
    z: usize,
    spacing: Vec3,
    iso: f64,
) -> Vec<Triangle> {
    let (lh, lw) = lo.dim();
    let mut ans = vec![];
    let mut points = Vec::with_capacity(12);
    for h in 0..lh - 1 {
        for w in 0..lw - 1 {
            let values = CORNERS.map(|[x, y, dz]| {
                let s = if dz == 0 { &lo } else { &hi };
                s[(h + y, w + x)]
            });
            let case = values
                .iter()
                .enumerate()
                .fold(0usize, |c, (i, &v)| if v >= iso { c | (1 << i) } else { c });

            for poly in CASES[case].iter() {
                points.clear();
                points.extend(poly.edges.iter().map(|&e| {
                    let e = e as usize;
                    let (a, b) = EDGES[e];
                    // 只依赖于 lo 端点的全局下标和两端的值, 相邻立方体得到的顶点按位相等.
                    let t = (iso - values[a]) / (values[b] - values[a]);
                    let base = CORNERS[a];
                    let index = [w + base[0], h + base[1], z + base[2]];
                    let mut p = [0, 1, 2].map(|i| index[i] as f64 * spacing[i]);
                    let axis = EDGE_AXIS[e];
                    p[axis] = (index[axis] as f64 + t) * spacing[axis];
                    p
                }));
                triangulate(poly, &points, &mut ans);
            }
        }
    }
    ans
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;
    }
}

/// 在 `iso` 处提取 `scalars` 的等值面. `scalars` 以 `(z, H, W)` 排列.
///
/// 网格的法向指向标量值较低的一侧. 相邻立方体共享的顶点坐标按位相等,
/// 因此 [`Mesh::to_indexed`] 能得到闭合的索引网格 (等值面与数据边界相交处除外).
///
/// # 返回值
///
/// - 数据为空时返回 `Err(LungError::EmptyVolume)`;
/// - 不满足 `min < iso <= max` 时 (不存在任何交点), 返回 `Err(LungError::DegenerateIsoValue)`,
///   调用者可以将其视为"该值处没有表面";
/// - 任一维度小于 2 时, 不存在单元立方体, 返回空网格.
pub fn marching_cubes<T>(scalars: ArrayView3<T>, geometry: &Geometry, iso: f64) -> LungResult<Mesh>
where
    T: ToPrimitive + Sync,
{
    if scalars.is_empty() {
        return Err(LungError::EmptyVolume);
    }
    let (min, max) = scalar_range(&scalars);
    if !(min < iso && iso <= max) {
        return Err(LungError::DegenerateIsoValue { iso, min, max });
    }
    let (lz, lh, lw) = scalars.dim();
    if lz < 2 || lh < 2 || lw < 2 {
        return Ok(Mesh::new());
    }

    let [sz, sh, sw] = geometry.spacing();
    let spacing = [sw, sh, sz];
    let slice = |z: usize| -> Array2<f64> { scalars.index_axis(Axis(0), z).map(scalar) };
    let slab = |z: usize| slab_triangles(slice(z).view(), slice(z + 1).view(), z, spacing, iso);

    #[cfg(feature = "rayon")]
    let slabs: Vec<_> = (0..lz - 1).into_par_iter().map(slab).collect();
    #[cfg(not(feature = "rayon"))]
    let slabs: Vec<_> = (0..lz - 1).map(slab).collect();
    let mesh = Mesh::from(slabs.into_iter().flatten().collect::<Vec<_>>());
    log::debug!("等值面 iso = {iso}: {} 个三角形", mesh.len());
    Ok(mesh)
}

/// 在多个等值处分别提取等值面, 结果与 `isos` 一一对应.
pub fn extract_many(volume: &CtVolume, isos: &[f64]) -> Vec<LungResult<Mesh>> {
    isos.iter()
        .map(|&iso| marching_cubes(volume.data(), volume.geometry(), iso))
        .collect()
}

/// 对多标签体数据中出现的每个非零标签分别提取表面.
///
/// 每个标签在其指示函数上以 [`INDICATOR_ISO`] 提取. 结果按标签升序排列.
/// 若某个标签占满整个体数据, 则其表面落在数据之外, 对应的网格为空.
pub fn extract_labels(labels: &LabelVolume) -> Vec<(u32, Mesh)> {
    let extract = |label: u32| {
        let indicator = labels.data().map(|&l| u8::from(l == label));
        let mesh = match marching_cubes(indicator.view(), labels.geometry(), INDICATOR_ISO) {
            Ok(m) => m,
            Err(e) => {
                log::debug!("标签 {label}: {e}");
                Mesh::new()
            }
        };
        log::info!("标签 {label}: {} 个三角形", mesh.len());
        (label, mesh)
    };

    let present = labels.present_labels();
    #[cfg(feature = "rayon")]
    let ans = present.into_par_iter().map(extract).collect();
    #[cfg(not(feature = "rayon"))]
    let ans = present.into_iter().map(extract).collect();
    ans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::BACKGROUND_LABEL;
    use approx::assert_relative_eq;
    use ndarray::{s, Array3};
    use std::f64::consts::PI;

    const CENTER: Vec3 = [11.3, 11.7, 12.1];
    const RADIUS: f64 = 6.3;
    const N: usize = 24;

    /// `f = r - |p - c|`, 球内为正. 下标为 `(z, h, w)`, 坐标为 `(w, h, z)`.
    fn sphere_field() -> Array3<f64> {
        Array3::from_shape_fn((N, N, N), |(z, h, w)| {
            let p = [w as f64, h as f64, z as f64];
            RADIUS - distance(p, CENTER)
        })
    }

    fn distance(a: Vec3, b: Vec3) -> f64 {
        mesh::norm(mesh::sub(a, b))
    }

    /// 两端一正一负的网格棱个数, 即交点个数.
    fn crossing_count(f: &Array3<f64>) -> usize {
        let inside = f.map(|&v| v >= 0.0);
        let mut n = 0;
        for axis in 0..3 {
            let len = inside.len_of(Axis(axis));
            let a = inside.slice_axis(Axis(axis), (0..len - 1).into());
            let b = inside.slice_axis(Axis(axis), (1..len).into());
            n += ndarray::Zip::from(&a)
                .and(&b)
                .fold(0, |acc, x, y| acc + usize::from(x != y));
        }
        n
    }

    #[test]
    fn test_sphere_topology() {
        let f = sphere_field();
        let mesh = marching_cubes(f.view(), &Geometry::unit(), 0.0).unwrap();
        let idx = mesh.to_indexed();

        assert_eq!(idx.vertices.len(), crossing_count(&f));
        assert!(idx.is_closed());
        assert_eq!(idx.euler_characteristic(), 2);
        assert_eq!(mesh.len(), 2 * idx.vertices.len() - 4);
    }

    #[test]
    fn test_sphere_geometry() {
        let f = sphere_field();
        let mesh = marching_cubes(f.view(), &Geometry::unit(), 0.0).unwrap();

        let area = 4.0 * PI * RADIUS * RADIUS;
        assert_relative_eq!(mesh.area(), area, max_relative = 0.05);

        for t in mesh.triangles() {
            for p in t {
                assert!((distance(*p, CENTER) - RADIUS).abs() < 0.05);
            }
        }

        // 法向朝外, 有向体积为正.
        let volume: f64 = mesh
            .triangles()
            .iter()
            .map(|[a, b, c]| {
                let n = mesh::cross(*b, *c);
                (a[0] * n[0] + a[1] * n[1] + a[2] * n[2]) / 6.0
            })
            .sum();
        assert_relative_eq!(volume, 4.0 / 3.0 * PI * RADIUS.powi(3), max_relative = 0.05);

        let outward = mesh
            .triangles()
            .iter()
            .zip(mesh.normals())
            .filter(|([a, ..], n)| {
                let d = mesh::sub(*a, CENTER);
                d[0] * n[0] + d[1] * n[1] + d[2] * n[2] > 0.0
            })
            .count();
        assert_eq!(outward, mesh.len());
    }

    #[test]
    fn test_single_voxel_with_spacing() {
        let mut v = Array3::<u8>::zeros((3, 3, 3));
        v[(1, 1, 1)] = 1;
        let g = Geometry::new([2.0, 1.0, 0.5]).unwrap();
        let mesh = marching_cubes(v.view(), &g, 0.5).unwrap();
        assert_eq!(mesh.len(), 8);

        let idx = mesh.to_indexed();
        assert_eq!(idx.vertices.len(), 6);
        assert!(idx.is_closed());

        let (lo, hi) = mesh.bounds().unwrap();
        assert_eq!(lo, [0.25, 0.5, 1.0]);
        assert_eq!(hi, [0.75, 1.5, 3.0]);
    }

    #[test]
    fn test_iso_range() {
        let mut v = Array3::<i16>::zeros((2, 2, 2));
        v[(0, 0, 0)] = 10;
        let g = Geometry::unit();
        assert!(marching_cubes(v.view(), &g, 10.0).is_ok());
        assert!(marching_cubes(v.view(), &g, 5.0).is_ok());
        for iso in [0.0, -1.0, 10.5, f64::NAN] {
            let e = marching_cubes(v.view(), &g, iso).unwrap_err();
            assert!(e.is_degenerate_iso(), "{iso}");
        }
    }

    #[test]
    fn test_infinite_scalars_give_finite_vertices() {
        let g = Geometry::unit();
        for (inf, iso) in [(f32::NEG_INFINITY, -1.0), (f32::INFINITY, 1.0)] {
            let mut v = Array3::<f32>::zeros((2, 2, 2));
            v[(0, 0, 0)] = inf;
            let m = marching_cubes(v.view(), &g, iso).unwrap();
            assert_eq!(m.len(), 1, "{inf}");
            assert!(m.triangles().iter().flatten().flatten().all(|c| c.is_finite()));
        }
    }

    #[test]
    fn test_thin_and_empty_volumes() {
        let g = Geometry::unit();
        let mut thin = Array3::<f32>::zeros((1, 4, 4));
        thin[(0, 1, 1)] = 1.0;
        assert!(marching_cubes(thin.view(), &g, 0.5).unwrap().is_empty());

        let empty = Array3::<f32>::zeros((0, 4, 4));
        assert!(matches!(
            marching_cubes(empty.view(), &g, 0.5),
            Err(LungError::EmptyVolume)
        ));
    }

    #[test]
    fn test_extract_many() {
        let f = sphere_field().mapv(|v| v as f32);
        let ct = CtVolume::new(f, Geometry::unit()).unwrap();
        let meshes = extract_many(&ct, &[0.0, -2.0, 100.0]);
        assert_eq!(meshes.len(), 3);
        let a = meshes[0].as_ref().unwrap().area();
        let b = meshes[1].as_ref().unwrap().area();
        // 等值越低, 球越大.
        assert!(b > a);
        assert!(meshes[2].as_ref().unwrap_err().is_degenerate_iso());
    }

    #[test]
    fn test_extract_labels() {
        let mut v = Array3::<u32>::zeros((6, 6, 10));
        v.slice_mut(s![1..4, 1..4, 1..4]).fill(1);
        v.slice_mut(s![2..5, 2..5, 6..9]).fill(3);
        let labels = LabelVolume::from_raw(v, Geometry::unit()).unwrap();
        let meshes = extract_labels(&labels);

        assert_eq!(meshes.iter().map(|(l, _)| *l).collect::<Vec<_>>(), vec![1, 3]);
        for (_, m) in &meshes {
            assert!(!m.is_empty());
            assert!(m.to_indexed().is_closed());
        }
        // 两个立方体大小相同, 表面也相同.
        assert_relative_eq!(meshes[0].1.area(), meshes[1].1.area(), epsilon = 1e-9);
    }

    #[test]
    fn test_label_filling_volume_gives_empty_mesh() {
        let v = Array3::<u32>::from_elem((3, 3, 3), 2);
        let labels = LabelVolume::from_raw(v, Geometry::unit()).unwrap();
        let meshes = extract_labels(&labels);
        assert_eq!(meshes.len(), 1);
        assert!(meshes[0].1.is_empty());
        assert_ne!(meshes[0].0, BACKGROUND_LABEL);
    }
}
