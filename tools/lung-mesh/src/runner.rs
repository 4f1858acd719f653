//! 程序运行函数.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lung_berry::prelude::*;
use utils::loader;

/// `scan` 子命令的一次任务.
#[derive(Debug, Clone)]
pub struct ScanJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub params: PipelineParams,
}

impl ScanJob {
    pub fn new(
        input: PathBuf,
        output: PathBuf,
        threshold: f32,
        iso: f64,
        fill: bool,
        smooth: usize,
    ) -> Self {
        let segment = SegmentParams {
            threshold,
            fill_lung_structures: fill,
            ..Default::default()
        };
        let params = PipelineParams {
            segment,
            iso_value: iso,
            smooth: (smooth > 0).then(|| SmoothParams::with_iterations(smooth)),
        };
        Self {
            input,
            output,
            params,
        }
    }
}

pub fn run_scan(job: &ScanJob) -> Result<Vec<PathBuf>> {
    let raw = loader::load_scan(&job.input)
        .with_context(|| format!("无法加载扫描 {}", job.input.display()))?;
    log::info!(
        "{}: rescale slope = {}, intercept = {}",
        job.input.display(),
        raw.rescale().slope(),
        raw.rescale().intercept()
    );
    let stem = loader::volume_stem(&job.input);
    mesh_scan(&raw, &job.params, &job.output, &stem)
}

/// 标定, 分割并保存 `{stem}_lung.stl` 和 `{stem}_lung.obj`. 返回写出的文件.
pub fn mesh_scan(
    raw: &RawVolume,
    params: &PipelineParams,
    output: &Path,
    stem: &str,
) -> Result<Vec<PathBuf>> {
    let out = lung_surface(raw, params)?;
    log::info!("肺部体积: {:.1} ml", out.mask().volume_ml());
    if out.mesh.is_empty() {
        log::warn!("{stem}: 未提取到肺部表面, 不写出文件");
        return Ok(vec![]);
    }
    save_both(&out.mesh, output, &format!("{stem}_lung"))
}

pub fn run_labels(input: &Path, output: &Path, smooth: usize) -> Result<Vec<PathBuf>> {
    let labels = loader::load_labels(input)
        .with_context(|| format!("无法加载标签文件 {}", input.display()))?;
    mesh_labels(&labels, output, &loader::volume_stem(input), smooth)
}

/// 对每个出现的标签保存 `{stem}_{label}.stl` 和 `{stem}_{label}.obj`. 空网格跳过.
pub fn mesh_labels(
    labels: &LabelVolume,
    output: &Path,
    stem: &str,
    smooth: usize,
) -> Result<Vec<PathBuf>> {
    let params = SmoothParams::with_iterations(smooth);
    let mut written = vec![];
    for (label, mesh) in extract_labels(labels) {
        if mesh.is_empty() {
            log::warn!("标签 {label}: 网格为空, 跳过");
            continue;
        }
        let mesh = mesh.smooth(&params);
        written.extend(save_both(&mesh, output, &format!("{stem}_{label}"))?);
    }
    Ok(written)
}

fn save_both(mesh: &Mesh, dir: &Path, name: &str) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("无法创建目录 {}", dir.display()))?;
    let stl = dir.join(format!("{name}.stl"));
    let obj = dir.join(format!("{name}.obj"));
    mesh.save_stl(&stl)
        .with_context(|| format!("无法写出 {}", stl.display()))?;
    mesh.save_obj(&obj)
        .with_context(|| format!("无法写出 {}", obj.display()))?;
    log::info!("已保存 {} 和 {}", stl.display(), obj.display());
    Ok(vec![stl, obj])
}
