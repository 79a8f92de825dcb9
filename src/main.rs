// ==========================================
// 车间管理系统 - 批量导入命令行入口
// ==========================================
// 用法: shop-admin <domain> <csv文件> [--db <数据库路径>]
//   domain: customers | parts | inventory
// 流程: 上传 -> 自动映射 -> 校验 -> 跳过冲突行 -> 落库
// ==========================================

use anyhow::{anyhow, Context, Result};
use shop_admin::config::DefaultImportConfig;
use shop_admin::logging;
use shop_admin::{HybridAnalyzer, ImportApi, SqliteRecordStore, APP_NAME, VERSION};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

struct CliArgs {
    domain: String,
    csv_path: PathBuf,
    db_path: Option<PathBuf>,
}

fn parse_args() -> Result<CliArgs> {
    let mut args = std::env::args().skip(1);
    let domain = args.next().ok_or_else(usage)?;
    let csv_path = PathBuf::from(args.next().ok_or_else(usage)?);

    let mut db_path = None;
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--db" => {
                db_path = Some(PathBuf::from(
                    args.next().ok_or_else(|| anyhow!("--db 缺少路径参数"))?,
                ));
            }
            other => return Err(anyhow!("未知参数: {}", other)),
        }
    }

    Ok(CliArgs {
        domain,
        csv_path,
        db_path,
    })
}

fn usage() -> anyhow::Error {
    anyhow!("用法: shop-admin <customers|parts|inventory> <csv文件> [--db <数据库路径>]")
}

/// 默认数据库路径: <系统数据目录>/shop-admin/shop.db
fn default_db_path() -> Result<PathBuf> {
    let base = dirs::data_dir().ok_or_else(|| anyhow!("无法定位系统数据目录"))?;
    Ok(base.join("shop-admin").join("shop.db"))
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    info!("========================================");
    info!("{} v{}", APP_NAME, VERSION);
    info!("========================================");

    let args = parse_args()?;

    let db_path = match args.db_path {
        Some(path) => path,
        None => default_db_path()?,
    };
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("创建数据目录失败: {}", parent.display()))?;
    }
    info!(db = %db_path.display(), "打开数据库");

    let store = Arc::new(
        SqliteRecordStore::new(&db_path.to_string_lossy())
            .map_err(|e| anyhow!("存储初始化失败: {}", e))?,
    );

    let text = std::fs::read_to_string(&args.csv_path)
        .with_context(|| format!("读取文件失败: {}", args.csv_path.display()))?;

    let mut api = ImportApi::new(
        &args.domain,
        store,
        HybridAnalyzer::rules_only(),
        Arc::new(DefaultImportConfig::default()),
    )
    .map_err(|e| anyhow!("{}", e))?;

    // ===== 上传 + 自动映射 =====
    let review = api.upload(&text).await.map_err(|e| anyhow!("{}", e))?;
    info!(rows = review.total_rows, "自动映射完成");
    for mapping in &review.mappings {
        match &mapping.target_field {
            Some(field) => info!(
                column = %mapping.source_column,
                field = %field,
                confidence = mapping.confidence,
                review = mapping.needs_review,
                "列已映射"
            ),
            None => info!(column = %mapping.source_column, "列已丢弃"),
        }
    }
    if !review.summary.unmapped_required.is_empty() {
        return Err(anyhow!(
            "必填字段未映射: {:?}，请调整表头后重试",
            review.summary.unmapped_required
        ));
    }

    // ===== 校验 + 落库 =====
    let confirmed = api.confirm_mappings().await.map_err(|e| anyhow!("{}", e))?;
    let done = if confirmed.status.stage == "conflicts" {
        let report = confirmed
            .report
            .as_ref()
            .ok_or_else(|| anyhow!("冲突阶段缺少校验报告"))?;
        warn!(
            conflict_rows = report.conflict_rows_count,
            error_rows = report.error_rows_count,
            valid_rows = report.valid_rows_count,
            "存在冲突/错误行, 将跳过受影响行继续"
        );
        for conflict in &report.report.conflicts {
            warn!(
                row = conflict.row_number,
                field = %conflict.field,
                value = %conflict.value,
                kind = ?conflict.kind,
                "冲突行"
            );
        }
        for error in &report.report.errors {
            warn!(row = error.row_number, field = %error.field, "缺失必填字段");
        }
        api.proceed_skipping_conflicts()
            .await
            .map_err(|e| anyhow!("{}", e))?
    } else {
        confirmed
    };

    let outcome = done
        .outcome
        .ok_or_else(|| anyhow!("导入未产出结果, 阶段: {}", done.status.stage))?;
    info!(
        imported = outcome.imported_count,
        skipped = outcome.skipped_count,
        failed = outcome.row_errors.len(),
        "导入完成"
    );
    for row_error in &outcome.row_errors {
        warn!(row = row_error.row_number, reason = %row_error.reason, "行落库失败");
    }

    // 机器可读的结果汇总
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if let Some(aborted) = &outcome.aborted {
        return Err(anyhow!(
            "第 {} 块提交失败, 后续块未提交: {}",
            aborted.chunk_index,
            aborted.message
        ));
    }

    Ok(())
}
