// ==========================================
// 集成测试公共工具
// ==========================================
// 提供: 临时文件数据库、CSV 文本构造、桩建议服务、计数桩存储
// ==========================================

#![allow(dead_code)]

use async_trait::async_trait;
use shop_admin::config::DefaultImportConfig;
use shop_admin::repository::{
    BulkInsertOutcome, RecordStore, RepositoryError, RepositoryResult,
};
use shop_admin::{
    ColumnMapping, HybridAnalyzer, ImportApi, ImportDomain, SqliteRecordStore,
};
use shop_admin::importer::{ImportResult, MappingSuggester, SuggestionRequest};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// 临时目录中的文件数据库（目录随返回值存活）
pub fn temp_store() -> (Arc<SqliteRecordStore>, TempDir) {
    shop_admin::logging::init_test();
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let db_path = dir.path().join("shop_test.db");
    let store =
        SqliteRecordStore::new(&db_path.to_string_lossy()).expect("初始化测试数据库失败");
    (Arc::new(store), dir)
}

/// 规则分析器 + 默认配置的导入接口
pub fn rules_api(domain: &str, store: Arc<SqliteRecordStore>) -> ImportApi {
    ImportApi::new(
        domain,
        store,
        HybridAnalyzer::rules_only(),
        Arc::new(DefaultImportConfig::default()),
    )
    .expect("创建导入接口失败")
}

/// 由表头与行构造 CSV 文本
pub fn csv(headers: &[&str], rows: &[&[&str]]) -> String {
    let mut text = headers.join(",");
    text.push('\n');
    for row in rows {
        text.push_str(&row.join(","));
        text.push('\n');
    }
    text
}

/// 按固定脚本应答的桩建议服务
pub struct ScriptedSuggester {
    /// 源列 -> 目标字段
    pub answers: HashMap<String, String>,
}

#[async_trait]
impl MappingSuggester for ScriptedSuggester {
    async fn suggest(&self, request: SuggestionRequest) -> ImportResult<Vec<ColumnMapping>> {
        Ok(request
            .headers
            .iter()
            .map(|header| ColumnMapping {
                source_column: header.clone(),
                target_field: self.answers.get(header).cloned(),
                confidence: 0.85,
                rationale: "suggested from sample values".to_string(),
                needs_review: false,
                is_manual: false,
            })
            .collect())
    }
}

/// 记录每块行数的桩存储，可配置第 N 块致命失败
pub struct ChunkCountingStore {
    pub chunk_sizes: Mutex<Vec<usize>>,
    pub fail_at_chunk: Option<usize>,
}

impl ChunkCountingStore {
    pub fn new(fail_at_chunk: Option<usize>) -> Self {
        Self {
            chunk_sizes: Mutex::new(Vec::new()),
            fail_at_chunk,
        }
    }
}

#[async_trait]
impl RecordStore for ChunkCountingStore {
    async fn exists(
        &self,
        _domain: ImportDomain,
        _field: &str,
        _value: &str,
    ) -> RepositoryResult<Option<String>> {
        Ok(None)
    }

    async fn bulk_insert(
        &self,
        _domain: ImportDomain,
        records: Vec<HashMap<String, String>>,
    ) -> RepositoryResult<BulkInsertOutcome> {
        let mut sizes = self.chunk_sizes.lock().unwrap();
        if self.fail_at_chunk == Some(sizes.len()) {
            return Err(RepositoryError::DatabaseConnectionError(
                "connection lost".to_string(),
            ));
        }
        sizes.push(records.len());
        Ok(BulkInsertOutcome {
            inserted_count: records.len(),
            per_row_errors: Vec::new(),
        })
    }

    async fn count_records(&self, _domain: ImportDomain) -> RepositoryResult<usize> {
        Ok(self.chunk_sizes.lock().unwrap().iter().sum())
    }
}
