//! 工程量提取命令行程序
//!
//! 读取 DXF 文件（或目录），运行提取流程，把结果写为 CSV 或 JSON。

use anyhow::{Context, Result};
use boq_core::config::{AppConfig, EngineConfig, EngineOverrides};
use boq_core::pipeline::Pipeline;
use boq_core::units::Unit;
use boq_file::dxf_io;
use boq_file::export::{collect_dxf_files, output_path, split_rows, CsvExporter, ExportFormat, JsonReport};
use clap::Parser;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "boq", version, about = "从 DXF 图纸提取工程量")]
struct Cli {
    /// DXF 文件或包含 DXF 文件的目录
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// 递归搜索子目录
    #[arg(short, long)]
    recursive: bool,

    /// 配置文件（默认读取 BOQ_CONFIG 或 ./boq.toml）
    #[arg(long, env = "BOQ_CONFIG")]
    config: Option<PathBuf>,

    /// 输出目录（默认写在输入文件旁）
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// 输出 JSON 而不是 CSV
    #[arg(long)]
    json: bool,

    /// 报表单位：m, cm, mm, ft, in
    #[arg(long, value_parser = parse_unit)]
    target_units: Option<Unit>,

    /// `$INSUNITS` 缺失时假定的图纸单位
    #[arg(long, value_parser = parse_unit)]
    unitless_units: Option<Unit>,

    /// 小数位数
    #[arg(long)]
    decimals: Option<u32>,

    /// 区域图层名称
    #[arg(long)]
    planner_layer: Option<String>,

    /// 最大嵌套深度
    #[arg(long)]
    max_depth: Option<usize>,

    /// 统计外部参照
    #[arg(long)]
    include_xrefs: bool,

    /// 不输出图层统计行
    #[arg(long)]
    no_layer_metrics: bool,

    /// 不汇总块参照，每个块参照输出一行
    #[arg(long)]
    no_aggregate_instances: bool,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> EngineOverrides {
        EngineOverrides {
            planner_layer: self.planner_layer.clone(),
            max_nested_depth: self.max_depth,
            decimals: self.decimals,
            target_units: self.target_units,
            unitless_units: self.unitless_units,
            include_xrefs: self.include_xrefs.then_some(true),
            aggregate_instances: self.no_aggregate_instances.then_some(false),
            layer_metrics: self.no_layer_metrics.then_some(false),
        }
    }

    fn format(&self) -> ExportFormat {
        if self.json {
            ExportFormat::Json
        } else {
            ExportFormat::Csv
        }
    }
}

fn parse_unit(s: &str) -> Result<Unit, String> {
    Unit::parse(s).ok_or_else(|| format!("unknown unit '{s}'"))
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    match &cli.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("加载配置 {} 失败", path.display())),
        None => AppConfig::discover().context("加载配置失败"),
    }
}

fn init_logging(config: &AppConfig, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_env_filter(filter).finish(),
    )?;
    Ok(())
}

/// 处理单个文件，返回输出路径
fn process_file(
    input: &Path,
    engine: &EngineConfig,
    out_dir: Option<&Path>,
    format: ExportFormat,
) -> Result<PathBuf> {
    let drawing = dxf_io::import(input, engine.unitless_units)
        .with_context(|| format!("读取 {} 失败", input.display()))?;
    let output = Pipeline::new(engine.clone()).run(&drawing);

    let (detail, summary) = split_rows(&output.rows);
    info!(
        "{}: 明细 {} 行，图层汇总 {} 行",
        input.display(),
        detail.len(),
        summary.len()
    );

    let target = output_path(input, out_dir, format);
    match format {
        ExportFormat::Csv => CsvExporter::new(engine.target_units, engine.decimals)
            .export_to_file(&output.rows, &target),
        ExportFormat::Json => {
            let source = input.to_string_lossy();
            JsonReport::new(&source, &output).export_to_file(&target)
        }
    }
    .with_context(|| format!("写入 {} 失败", target.display()))?;
    Ok(target)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // 初始化日志
    init_logging(&config, cli.verbose)?;

    let engine = config.engine.with_overrides(&cli.overrides())?;

    let mut files = Vec::new();
    for path in &cli.paths {
        files.extend(collect_dxf_files(path, cli.recursive)?);
    }
    if files.is_empty() {
        anyhow::bail!("没有找到 DXF 文件");
    }
    info!("共 {} 个文件", files.len());

    let format = cli.format();
    let out_dir = cli.out_dir.as_deref();
    let results: Vec<(PathBuf, Result<PathBuf>)> = files
        .par_iter()
        .map(|file| (file.clone(), process_file(file, &engine, out_dir, format)))
        .collect();

    let mut failed = 0;
    for (input, result) in results {
        match result {
            Ok(target) => info!("{} -> {}", input.display(), target.display()),
            Err(e) => {
                failed += 1;
                error!("{}: {:#}", input.display(), e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} 个文件处理失败", failed);
    }
    Ok(())
}
