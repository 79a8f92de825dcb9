// ==========================================
// 车间管理系统 - 领域模型层
// ==========================================
// 职责: 定义导入领域的实体、类型、静态 Schema
// 红线: 不含数据访问逻辑,不含管道逻辑
// ==========================================

pub mod import;
pub mod schema;
pub mod types;

// 重导出核心类型
pub use import::{
    ChunkFailure, ColumnMapping, ConflictRecord, ExistingRef, ImportOutcome, MappedRecord,
    MappingSummary, ParsedDocument, ReassignmentRequest, Row, RowError, ValidationError,
    ValidationReport,
};
pub use schema::{DomainSchema, FieldDefinition, FieldType};
pub use types::{ConflictKind, ImportDomain, ValidationKind};
