// ==========================================
// 车间管理系统 - 记录存储 SQLite 实现
// ==========================================
// 职责: customers/parts/inventory 三张业务表的查询与批量写入
// 说明: 表结构由 DomainSchema 生成，自然键带 UNIQUE COLLATE NOCASE 约束，
//       冲突检测漏掉的重复由约束在行级兜住
// ==========================================

use crate::db::{configure_sqlite_connection, open_sqlite_connection};
use crate::domain::schema::DomainSchema;
use crate::domain::types::ImportDomain;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::error::{RepositoryError, RepositoryResult};
use super::record_store::{BulkInsertOutcome, RecordStore, RowInsertError};

// ==========================================
// SqliteRecordStore
// ==========================================
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// 打开数据库文件并初始化表结构
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 内存数据库（测试用）
    pub fn in_memory() -> RepositoryResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        configure_sqlite_connection(&conn)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（连接会再次应用统一 PRAGMA，幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)
                .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
            Self::init_schema(&guard)?;
        }

        Ok(Self { conn })
    }

    /// 依据 DomainSchema 建表
    ///
    /// 所有业务字段统一 TEXT 列；自然键字段附加 UNIQUE COLLATE NOCASE
    fn init_schema(conn: &Connection) -> RepositoryResult<()> {
        for domain in [
            ImportDomain::Customers,
            ImportDomain::Parts,
            ImportDomain::Inventory,
        ] {
            let schema = DomainSchema::for_domain(domain);
            let mut columns = vec!["id TEXT PRIMARY KEY".to_string()];

            for field in schema.fields {
                let mut column = format!("{} TEXT", field.key);
                if schema.unique_fields.contains(&field.key) {
                    column.push_str(" COLLATE NOCASE UNIQUE");
                }
                columns.push(column);
            }
            columns.push("created_at TEXT NOT NULL DEFAULT (datetime('now'))".to_string());

            let sql = format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                domain.table_name(),
                columns.join(", ")
            );
            conn.execute(&sql, [])?;
        }

        Ok(())
    }

    fn lock(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn exists(
        &self,
        domain: ImportDomain,
        field: &str,
        value: &str,
    ) -> RepositoryResult<Option<String>> {
        let schema = DomainSchema::for_domain(domain);

        // 字段名参与 SQL 拼接，必须先对静态 Schema 验证
        if schema.field(field).is_none() {
            return Err(RepositoryError::InvalidInput(format!(
                "未知查询字段: {}.{}",
                domain, field
            )));
        }

        let conn = self.lock()?;
        let sql = format!(
            "SELECT id FROM {} WHERE {} = ?1 COLLATE NOCASE LIMIT 1",
            domain.table_name(),
            field
        );
        let id: Option<String> = conn
            .query_row(&sql, [value], |row| row.get(0))
            .optional()?;

        Ok(id)
    }

    async fn bulk_insert(
        &self,
        domain: ImportDomain,
        records: Vec<HashMap<String, String>>,
    ) -> RepositoryResult<BulkInsertOutcome> {
        let schema = DomainSchema::for_domain(domain);
        let table = domain.table_name();

        let mut guard = self.lock()?;
        let tx = guard
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut inserted_count = 0usize;
        let mut per_row_errors = Vec::new();

        for (index, record) in records.iter().enumerate() {
            // 按 Schema 字段顺序取值，未知键直接记为行级失败
            if let Some(unknown) = record.keys().find(|k| schema.field(k).is_none()) {
                per_row_errors.push(RowInsertError {
                    index,
                    reason: format!("未知字段: {}", unknown),
                });
                continue;
            }

            let mut columns = vec!["id"];
            let mut values: Vec<String> = vec![Uuid::new_v4().to_string()];
            for field in schema.fields {
                if let Some(v) = record.get(field.key) {
                    columns.push(field.key);
                    values.push(v.clone());
                }
            }
            columns.push("created_at");
            values.push(Utc::now().to_rfc3339());

            let placeholders = (1..=values.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders
            );

            // 行级失败捕获后继续，块内其余行不受影响
            match tx.execute(&sql, params_from_iter(values.iter())) {
                Ok(_) => inserted_count += 1,
                Err(e) => per_row_errors.push(RowInsertError {
                    index,
                    reason: RepositoryError::from(e).to_string(),
                }),
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(BulkInsertOutcome {
            inserted_count,
            per_row_errors,
        })
    }

    async fn count_records(&self, domain: ImportDomain) -> RepositoryResult<usize> {
        let conn = self.lock()?;
        let sql = format!("SELECT COUNT(*) FROM {}", domain.table_name());
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_bulk_insert_and_exists() {
        let store = SqliteRecordStore::in_memory().unwrap();

        let outcome = store
            .bulk_insert(
                ImportDomain::Customers,
                vec![
                    record(&[("customer_code", "C001"), ("name", "Acme Machining")]),
                    record(&[("customer_code", "C002"), ("name", "Baker Tool")]),
                ],
            )
            .await
            .unwrap();

        assert_eq!(outcome.inserted_count, 2);
        assert!(outcome.per_row_errors.is_empty());

        // 大小写不敏感查询
        let hit = store
            .exists(ImportDomain::Customers, "customer_code", "c001")
            .await
            .unwrap();
        assert!(hit.is_some());

        let miss = store
            .exists(ImportDomain::Customers, "customer_code", "C999")
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_unique_violation_is_row_level() {
        let store = SqliteRecordStore::in_memory().unwrap();

        let outcome = store
            .bulk_insert(
                ImportDomain::Parts,
                vec![
                    record(&[("part_number", "P-100")]),
                    record(&[("part_number", "p-100")]), // NOCASE 重复
                    record(&[("part_number", "P-200")]),
                ],
            )
            .await
            .unwrap();

        // 重复行失败，其余行继续
        assert_eq!(outcome.inserted_count, 2);
        assert_eq!(outcome.per_row_errors.len(), 1);
        assert_eq!(outcome.per_row_errors[0].index, 1);

        assert_eq!(
            store.count_records(ImportDomain::Parts).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_exists_rejects_unknown_field() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let result = store
            .exists(ImportDomain::Customers, "no_such; DROP TABLE", "x")
            .await;
        assert!(matches!(result, Err(RepositoryError::InvalidInput(_))));
    }
}
