// ==========================================
// 车间管理系统 - 冲突与校验引擎
// ==========================================
// 职责: 必填字段校验 + 两级重复检测（批内 / 存量库）
// 红线: 只读引擎，绝不修改行数据或落库；
//       批内重复的键组内所有行都标记冲突，首行引用自身行号
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::import::{
    ConflictRecord, ExistingRef, Row, ValidationError, ValidationReport,
};
use crate::domain::schema::DomainSchema;
use crate::domain::types::{ConflictKind, ImportDomain, ValidationKind};
use crate::repository::RecordStore;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::error::{ImportError, ImportResult};
use super::mapping::MappingSet;

/// 重复检测用的键值归一化（修剪 + 小写）
fn normalize_value(value: &str) -> String {
    value.trim().to_lowercase()
}

/// 对整批行运行校验与冲突检测
///
/// # 参数
/// - mappings: 已确认的映射集合（投影在引擎内完成）
/// - rows: 全部数据行（行号已分配）
/// - store: 存量记录查询协作方
///
/// # 返回
/// - Ok(ValidationReport): 冲突与错误明细 + 干净行数
/// - Err(LookupFailed / LookupTimeout): 存量查询不可用，批次不可继续
/// - Err(Cancelled): 会话已取消
pub async fn validate_rows(
    mappings: &MappingSet,
    rows: &[Row],
    store: &dyn RecordStore,
    config: &dyn ImportConfigReader,
    cancel: &CancellationToken,
) -> ImportResult<ValidationReport> {
    let domain = mappings.domain();
    let schema = DomainSchema::for_domain(domain);
    let timeout_ms = config.get_collaborator_timeout_ms().await?;
    let retry_enabled = config.get_lookup_retry_enabled().await?;

    let records: Vec<_> = rows.iter().map(|row| mappings.project(row)).collect();

    // ===== 必填字段校验 =====
    let mut errors: Vec<ValidationError> = Vec::new();
    for record in &records {
        for field in schema.required_fields() {
            if !record.values.contains_key(field) {
                errors.push(ValidationError {
                    row_number: record.row_number,
                    kind: ValidationKind::MissingRequiredField,
                    field: field.to_string(),
                });
            }
        }
    }

    // ===== 批内重复检测 =====
    let mut conflicts: Vec<ConflictRecord> = Vec::new();
    // (字段, 归一化键值) -> 出现行号（保持出现顺序）
    let mut occurrences: HashMap<(&'static str, String), Vec<u32>> = HashMap::new();
    for record in &records {
        for field in schema.unique_fields {
            if let Some(value) = record.values.get(*field) {
                occurrences
                    .entry((*field, normalize_value(value)))
                    .or_default()
                    .push(record.row_number);
            }
        }
    }

    for ((field, value), row_numbers) in &occurrences {
        if row_numbers.len() < 2 {
            continue;
        }
        // 组内所有行都标记，首行引用自身
        let first = row_numbers[0];
        for &row_number in row_numbers {
            conflicts.push(ConflictRecord {
                row_number,
                kind: ConflictKind::CsvDuplicate,
                field: field.to_string(),
                value: value.clone(),
                existing_reference: ExistingRef::BatchRow(first),
            });
        }
    }

    // ===== 存量库重复检测 =====
    // 同键值只查一次，命中后回标持有该值的所有行
    for ((field, value), row_numbers) in &occurrences {
        if cancel.is_cancelled() {
            return Err(ImportError::Cancelled);
        }

        let existing_id =
            lookup_existing(store, domain, field, value, timeout_ms, retry_enabled).await?;
        if let Some(id) = existing_id {
            for &row_number in row_numbers {
                conflicts.push(ConflictRecord {
                    row_number,
                    kind: ConflictKind::StoreDuplicate,
                    field: field.to_string(),
                    value: value.clone(),
                    existing_reference: ExistingRef::StoreId(id.clone()),
                });
            }
        }
    }

    conflicts.sort_by_key(|c| (c.row_number, c.field.clone()));
    errors.sort_by_key(|e| (e.row_number, e.field.clone()));

    let affected = conflicts
        .iter()
        .map(|c| c.row_number)
        .chain(errors.iter().map(|e| e.row_number))
        .collect::<std::collections::BTreeSet<_>>();
    let report = ValidationReport {
        valid_rows_count: rows.len() - affected.len(),
        conflicts,
        errors,
    };

    info!(
        domain = %domain,
        total = rows.len(),
        valid = report.valid_rows_count,
        conflict_rows = report.conflict_rows_count(),
        error_rows = report.error_rows_count(),
        "批次校验完成"
    );
    Ok(report)
}

/// 带超时的存量查询，失败后按配置单次重试
///
/// 查询幂等可重试；最终失败向上抛错，绝不把"查不到"和"查失败"混同。
async fn lookup_existing(
    store: &dyn RecordStore,
    domain: ImportDomain,
    field: &str,
    value: &str,
    timeout_ms: u64,
    retry_enabled: bool,
) -> ImportResult<Option<String>> {
    let attempts = if retry_enabled { 2 } else { 1 };
    let mut last_error = None;

    for attempt in 1..=attempts {
        match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            store.exists(domain, field, value),
        )
        .await
        {
            Ok(Ok(result)) => return Ok(result),
            Ok(Err(e)) => {
                warn!(field = %field, attempt, error = %e, "存量查询失败");
                last_error = Some(ImportError::LookupFailed(e.to_string()));
            }
            Err(_) => {
                warn!(field = %field, attempt, "存量查询超时");
                last_error = Some(ImportError::LookupTimeout);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| ImportError::Internal("查询循环未执行".to_string())))
}
