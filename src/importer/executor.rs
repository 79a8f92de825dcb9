// ==========================================
// 车间管理系统 - 分块落库执行器
// ==========================================
// 职责: 跳过冲突行、按 Schema 整形字段值、分块顺序提交
// 红线: 块级致命失败后已提交块绝不回滚，也绝不静默吞掉；
//       插入不幂等，任何情况下不自动重试
// ==========================================

use crate::domain::import::{ChunkFailure, ImportOutcome, Row, RowError};
use crate::domain::schema::{DomainSchema, FieldType};
use crate::repository::RecordStore;
use std::collections::{BTreeSet, HashMap};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::error::{ImportError, ImportResult};
use super::mapping::MappingSet;

// ==========================================
// BatchExecutor
// ==========================================
pub struct BatchExecutor;

impl BatchExecutor {
    /// 执行整批落库
    ///
    /// # 参数
    /// - skip_rows: 人工确认跳过的行号（冲突/错误行），绝不提交
    /// - chunk_size: 单块行数（0 按 1 处理）
    ///
    /// # 返回
    /// - Ok(ImportOutcome): 含行级失败与可能的块级中止，均不算 Err
    /// - Err(Cancelled): 会话取消，后续块未提交
    pub async fn execute(
        mappings: &MappingSet,
        rows: &[Row],
        skip_rows: &BTreeSet<u32>,
        chunk_size: usize,
        store: &dyn RecordStore,
        cancel: &CancellationToken,
    ) -> ImportResult<ImportOutcome> {
        let domain = mappings.domain();
        let schema = DomainSchema::for_domain(domain);
        let chunk_size = chunk_size.max(1);

        // 跳过行不参与提交，其余行投影 + 整形
        let mut skipped_count = 0usize;
        let mut pending: Vec<(u32, HashMap<String, String>)> = Vec::new();
        for row in rows {
            if skip_rows.contains(&row.row_number) {
                skipped_count += 1;
                continue;
            }
            let record = mappings.project(row);
            pending.push((record.row_number, shape_record(schema, record.values)));
        }

        let mut imported_count = 0usize;
        let mut row_errors: Vec<RowError> = Vec::new();
        let mut aborted: Option<ChunkFailure> = None;

        let chunks: Vec<&[(u32, HashMap<String, String>)]> =
            pending.chunks(chunk_size).collect();
        let total_chunks = chunks.len();

        for (chunk_index, chunk) in chunks.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ImportError::Cancelled);
            }

            let records: Vec<HashMap<String, String>> =
                chunk.iter().map(|(_, record)| record.clone()).collect();
            match store.bulk_insert(domain, records).await {
                Ok(outcome) => {
                    imported_count += outcome.inserted_count;
                    for row_error in outcome.per_row_errors {
                        match chunk.get(row_error.index) {
                            Some((row_number, record)) => row_errors.push(RowError {
                                row_number: *row_number,
                                reason: row_error.reason,
                                raw_data: record.clone(),
                            }),
                            None => warn!(
                                chunk_index,
                                index = row_error.index,
                                "存储返回的行下标越界, 忽略"
                            ),
                        }
                    }
                }
                Err(e) => {
                    // 致命失败: 本块与后续块不再提交，已提交块保持原状
                    error!(chunk_index, total_chunks, error = %e, "块提交致命失败, 中止后续块");
                    let message = e.to_string();
                    for later_chunk in &chunks[chunk_index..] {
                        for (row_number, record) in later_chunk.iter() {
                            row_errors.push(RowError {
                                row_number: *row_number,
                                reason: format!("未提交: {}", message),
                                raw_data: record.clone(),
                            });
                        }
                    }
                    aborted = Some(ChunkFailure {
                        chunk_index,
                        message,
                    });
                    break;
                }
            }
        }

        info!(
            domain = %domain,
            imported = imported_count,
            skipped = skipped_count,
            failed = row_errors.len(),
            aborted = aborted.is_some(),
            "批次落库结束"
        );

        Ok(ImportOutcome {
            imported_count,
            skipped_count,
            row_errors,
            aborted,
        })
    }
}

/// 按字段定义整形一条记录
///
/// 数值字段解析后保留 2 位小数，解析失败的值不落库；
/// 缺失字段按 Schema 缺省值补齐。
fn shape_record(
    schema: &DomainSchema,
    mut values: HashMap<String, String>,
) -> HashMap<String, String> {
    for field in schema.fields {
        match values.get(field.key).cloned() {
            Some(raw) if field.field_type == FieldType::Number => {
                match raw.replace([',', '$'], "").trim().parse::<f64>() {
                    Ok(number) => {
                        values.insert(field.key.to_string(), format!("{:.2}", number));
                    }
                    Err(_) => {
                        warn!(field = field.key, value = %raw, "数值字段解析失败, 该值不落库");
                        values.remove(field.key);
                    }
                }
            }
            Some(_) => {}
            None => {
                if let Some(default) = field.default_value {
                    values.insert(field.key.to_string(), default.to_string());
                }
            }
        }
    }
    values
}
