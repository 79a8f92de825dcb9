// ==========================================
// 车间管理系统 - 记录存储 Trait
// ==========================================
// 职责: 定义导入管道依赖的存储协作方接口（不包含业务逻辑）
// 说明: 冲突引擎用 exists 做自然键查询，执行器用 bulk_insert 落库
// ==========================================

use crate::domain::types::ImportDomain;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::RepositoryResult;

// ==========================================
// 批量插入结果
// ==========================================
/// 单行插入失败（块内相对下标）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowInsertError {
    /// 该行在提交块内的下标（0 起始）
    pub index: usize,
    pub reason: String,
}

/// 一个提交块的插入结果
///
/// 行级失败被捕获进 per_row_errors，块内其余行继续尝试；
/// 块级致命失败（连接丢失等）以 Err 返回，由执行器中止后续块。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkInsertOutcome {
    pub inserted_count: usize,
    pub per_row_errors: Vec<RowInsertError>,
}

// ==========================================
// RecordStore Trait
// ==========================================
// 用途: 托管记录存储的数据访问
// 实现者: SqliteRecordStore（使用 rusqlite）
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 按自然键查询已存在记录
    ///
    /// # 参数
    /// - domain: 导入域
    /// - field: 自然键字段（必须属于该域 Schema）
    /// - value: 键值（比较不区分大小写）
    ///
    /// # 返回
    /// - Ok(Some(id)): 已存在记录的标识
    /// - Ok(None): 不存在
    async fn exists(
        &self,
        domain: ImportDomain,
        field: &str,
        value: &str,
    ) -> RepositoryResult<Option<String>>;

    /// 批量插入一个提交块
    ///
    /// # 参数
    /// - domain: 导入域
    /// - records: 字段键值记录列表（一块最多 chunk_size 条）
    ///
    /// # 返回
    /// - Ok(BulkInsertOutcome): 行级失败已捕获，不中断块
    /// - Err: 块级致命失败（整块未提交）
    async fn bulk_insert(
        &self,
        domain: ImportDomain,
        records: Vec<HashMap<String, String>>,
    ) -> RepositoryResult<BulkInsertOutcome>;

    /// 统计某导入域的记录数（测试与诊断用）
    async fn count_records(&self, domain: ImportDomain) -> RepositoryResult<usize>;
}
