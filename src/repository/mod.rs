// ==========================================
// 车间管理系统 - 数据仓储层
// ==========================================
// 职责: 定义记录存储协作方接口 + SQLite 实现
// 红线: Repository 不含业务规则，只做数据存取
// ==========================================

pub mod error;
pub mod record_store;
pub mod sqlite_store;

// 重导出核心类型
pub use error::{RepositoryError, RepositoryResult};
pub use record_store::{BulkInsertOutcome, RecordStore, RowInsertError};
pub use sqlite_store::SqliteRecordStore;
