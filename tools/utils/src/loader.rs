//! 输入输出路径的解析, 以及对 `lung-berry` 加载函数的一层封装.

use lung_berry::{LabelVolume, LungResult, RawVolume};
use std::env;
use std::path::{Path, PathBuf};

/// 扫描文件路径的环境变量.
pub const SCAN_PATH_VAR: &str = "LUNG_SCAN_PATH";

/// 网格输出目录的环境变量.
pub const OUTPUT_DIR_VAR: &str = "LUNG_OUTPUT_DIR";

/// 多标签文件路径的环境变量.
pub const LABEL_PATH_VAR: &str = "LUNG_LABEL_PATH";

/// 获得 `$HOME/dataset/...` 路径. 若找不到 home 目录, 则返回 `None`.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    ans.extend(it);
    Some(ans)
}

/// 1. 若环境变量 `var` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/` 下的 `fallback`.
pub fn path_from_env_or_home<P, I>(var: &str, fallback: I) -> Option<PathBuf>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = P>,
{
    match env::var(var) {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => home_dataset_dir_with(fallback),
    }
}

/// 获取 CT 扫描文件路径.
///
/// 1. 若环境变量 `$LUNG_SCAN_PATH` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/lung/scan.nii`.
#[inline]
pub fn scan_path_from_env_or_home() -> Option<PathBuf> {
    path_from_env_or_home(SCAN_PATH_VAR, ["lung", "scan.nii"])
}

/// 获取网格输出目录.
///
/// 1. 若环境变量 `$LUNG_OUTPUT_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/lung/mesh`.
#[inline]
pub fn output_dir_from_env_or_home() -> Option<PathBuf> {
    path_from_env_or_home(OUTPUT_DIR_VAR, ["lung", "mesh"])
}

/// 获取多标签文件路径.
///
/// 1. 若环境变量 `$LUNG_LABEL_PATH` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/lung/label.nii`.
#[inline]
pub fn label_path_from_env_or_home() -> Option<PathBuf> {
    path_from_env_or_home(LABEL_PATH_VAR, ["lung", "label.nii"])
}

/// 去掉 `.nii` 或 `.nii.gz` 扩展名后的文件名, 用作输出文件名前缀.
pub fn volume_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("volume");
    let name = name.strip_suffix(".gz").unwrap_or(name);
    name.strip_suffix(".nii").unwrap_or(name).to_string()
}

/// 加载以 int16 存储的 CT 扫描, 保留原始整数. 标定由调用者通过 `to_hu` 完成.
#[inline]
pub fn load_scan<P: AsRef<Path>>(path: P) -> LungResult<RawVolume> {
    RawVolume::open(path)
}

/// 加载多标签文件.
#[inline]
pub fn load_labels<P: AsRef<Path>>(path: P) -> LungResult<LabelVolume> {
    LabelVolume::open(path)
}
