// ==========================================
// 车间管理系统 - 批量导入核心库
// ==========================================
// 技术栈: Rust + Tokio + SQLite
// 系统定位: 车间管理工具的批量数据导入子系统
// 职责: CSV 解析 + 列映射 + 冲突检测 + 分块落库 + 导入会话编排
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 导入层 - 核心管道
pub mod importer;

// 数据仓储层 - 记录存储
pub mod repository;

// 配置层 - 导入参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ConflictKind, ImportDomain, ValidationKind};

// 领域实体
pub use domain::{
    ChunkFailure, ColumnMapping, ConflictRecord, ExistingRef, ImportOutcome, MappedRecord,
    MappingSummary, ParsedDocument, ReassignmentRequest, Row, RowError, ValidationError,
    ValidationReport,
};

// 领域 Schema
pub use domain::schema::{DomainSchema, FieldDefinition, FieldType};

// 导入管道
pub use importer::{
    BatchExecutor, HybridAnalyzer, ImportSession, ImportStage, MappingSet, MappingSuggester,
    SetMappingOutcome, SuggestionRequest, SuggestionResponse,
};

// 仓储
pub use repository::{BulkInsertOutcome, RecordStore, RowInsertError, SqliteRecordStore};

// API
pub use api::ImportApi;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "车间管理系统 - 批量导入";
