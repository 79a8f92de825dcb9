// ==========================================
// 车间管理系统 - 导入领域实体
// ==========================================
// 职责: 列映射/行记录/冲突记录/校验错误/导入结果等核心数据结构
// 红线: 行号 row_number 在解析阶段一次性分配，此后绝不重新推导
// ==========================================

use crate::domain::types::{ConflictKind, ValidationKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

// ==========================================
// ColumnMapping - 列映射
// ==========================================
/// 一个源列到目标字段的映射建议/决定
///
/// # 字段说明
/// - source_column: 表头文本（映射集合内唯一）
/// - target_field: 目标字段 key（None = 丢弃该列）
/// - confidence: 建议置信度 [0,1]
/// - rationale: 建议理由（人类可读）
/// - needs_review: 置信度低于阈值且有目标字段时为 true
/// - is_manual: 人工覆盖过建议后为 true
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source_column: String,
    pub target_field: Option<String>,
    pub confidence: f64,
    pub rationale: String,
    pub needs_review: bool,
    pub is_manual: bool,
}

// ==========================================
// Row - 数据行
// ==========================================
/// 与表头对齐的一行字符串单元格
///
/// row_number 为数据行内 1 起始的位置（表头不计入），
/// 在一次导入会话的生命周期内保持稳定，分块后也不重算。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub row_number: u32,
    pub cells: Vec<String>,
}

// ==========================================
// ParsedDocument - 解析结果
// ==========================================
/// 解析后的文档: 表头 + 已编号的数据行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl ParsedDocument {
    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }
}

// ==========================================
// MappedRecord - 映射后的行记录
// ==========================================
/// 应用列映射后的字段键值记录（丢弃列已剔除，空值已剔除）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappedRecord {
    pub row_number: u32,
    pub values: HashMap<String, String>,
}

// ==========================================
// ExistingRef - 冲突引用
// ==========================================
/// 冲突记录指向的"已存在方"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ExistingRef {
    /// 同批次内该键首次出现的行号
    BatchRow(u32),
    /// 已落库记录的标识
    StoreId(String),
}

// ==========================================
// ConflictRecord - 冲突记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub row_number: u32,
    pub kind: ConflictKind,
    /// 触发冲突的自然键字段
    pub field: String,
    /// 归一化后的键值
    pub value: String,
    pub existing_reference: ExistingRef,
}

// ==========================================
// ValidationError - 行级校验错误
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub row_number: u32,
    pub kind: ValidationKind,
    pub field: String,
}

// ==========================================
// ValidationReport - 校验报告
// ==========================================
/// 冲突与校验引擎的输出
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid_rows_count: usize,
    pub conflicts: Vec<ConflictRecord>,
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    /// 受影响行号的并集
    ///
    /// 统计口径: 同一行可能同时出现在冲突集与错误集，
    /// 任何"受影响行数"统计必须取并集而非相加。
    pub fn affected_rows(&self) -> BTreeSet<u32> {
        self.conflicts
            .iter()
            .map(|c| c.row_number)
            .chain(self.errors.iter().map(|e| e.row_number))
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty() && self.errors.is_empty()
    }

    pub fn conflict_rows_count(&self) -> usize {
        self.conflicts
            .iter()
            .map(|c| c.row_number)
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn error_rows_count(&self) -> usize {
        self.errors
            .iter()
            .map(|e| e.row_number)
            .collect::<BTreeSet<_>>()
            .len()
    }
}

// ==========================================
// RowError / ChunkFailure / ImportOutcome
// ==========================================
/// 单行落库失败记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowError {
    pub row_number: u32,
    pub reason: String,
    /// 失败行的字段键值快照（用于前端展示和人工补录）
    pub raw_data: HashMap<String, String>,
}

/// 块级致命失败（连接丢失等），导致后续块不再提交
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkFailure {
    /// 失败块的序号（0 起始）
    pub chunk_index: usize,
    pub message: String,
}

/// 导入执行结果
///
/// 部分提交语义: aborted 非空时，已完成块中的行保持已提交状态，
/// 不做自动回滚；结果仍作为"带错误的完成"上报，不静默失败。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub imported_count: usize,
    pub skipped_count: usize,
    pub row_errors: Vec<RowError>,
    pub aborted: Option<ChunkFailure>,
}

// ==========================================
// MappingSummary / ReassignmentRequest
// ==========================================
/// 每次映射变更后重算的汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingSummary {
    /// 无列认领的必填字段
    pub unmapped_required: Vec<String>,
    /// 无列认领的可选字段
    pub unmapped_optional: Vec<String>,
    /// target_field 为空的源列
    pub discarded_columns: Vec<String>,
}

/// 字段改派请求
///
/// 当 set_mapping 的目标字段已被其他列认领时返回，
/// 需经人工确认后以单个原子动作完成改派。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignmentRequest {
    pub source_column: String,
    pub target_field: String,
    pub currently_holding_column: String,
}
