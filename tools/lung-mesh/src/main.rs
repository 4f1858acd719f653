//! 从 NIfTI 文件生成肺部 (或多标签结构) 的表面网格, 保存为 STL 和 OBJ.
//!
//! 未在命令行给出的路径依次取自环境变量 `$LUNG_SCAN_PATH`, `$LUNG_LABEL_PATH`,
//! `$LUNG_OUTPUT_DIR`, 或者 `$HOME/dataset/lung/` 下的默认位置.
//! 日志级别可以通过 `$RUST_LOG` 调整.

mod runner;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use simple_logger::SimpleLogger;
use utils::loader;

/// 肺部表面网格生成
#[derive(Parser)]
#[command(name = "lung-mesh")]
#[command(about = "CT 扫描 -> 肺部掩膜 -> 表面网格", long_about = None)]
#[command(version)]
struct Cli {
    /// 输出目录
    #[arg(long, short, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 从 CT 扫描分割肺部并提取表面
    Scan {
        /// NIfTI 扫描文件
        path: Option<PathBuf>,

        /// 空气 / 组织分界 (HU)
        #[arg(long, default_value_t = -700.0, allow_negative_numbers = true)]
        threshold: f32,

        /// 表面等值 (HU)
        #[arg(long, default_value_t = -500.0, allow_negative_numbers = true)]
        iso: f64,

        /// 不进行逐切片空洞填充
        #[arg(long)]
        no_fill: bool,

        /// 平滑迭代次数
        #[arg(long, default_value_t = 0)]
        smooth: usize,
    },

    /// 对多标签文件中的每个标签分别提取表面
    Labels {
        /// NIfTI 多标签文件
        path: Option<PathBuf>,

        /// 平滑迭代次数
        #[arg(long, default_value_t = 30)]
        smooth: usize,
    },
}

fn main() -> Result<()> {
    SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()?;
    let cli = Cli::parse();

    let output = match cli.output {
        Some(p) => p,
        None => loader::output_dir_from_env_or_home().context("无法确定输出目录")?,
    };

    match cli.command {
        Commands::Scan {
            path,
            threshold,
            iso,
            no_fill,
            smooth,
        } => {
            let path = match path {
                Some(p) => p,
                None => loader::scan_path_from_env_or_home().context("无法确定扫描文件路径")?,
            };
            let job = runner::ScanJob::new(path, output, threshold, iso, !no_fill, smooth);
            runner::run_scan(&job)?;
        }
        Commands::Labels { path, smooth } => {
            let path = match path {
                Some(p) => p,
                None => loader::label_path_from_env_or_home().context("无法确定标签文件路径")?,
            };
            runner::run_labels(&path, &output, smooth)?;
        }
    }
    utils::sep();
    Ok(())
}
