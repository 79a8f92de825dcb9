// ==========================================
// 车间管理系统 - 导入管道
// ==========================================
// 职责: 解析 / 映射 / 建议 / 校验 / 落库 / 会话编排
// 红线: 管道各级只通过领域实体交换数据，不直接触碰 SQL
// ==========================================

pub mod error;
pub mod executor;
pub mod mapping;
pub mod session;
pub mod suggester;
pub mod text_parser;
pub mod validator;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use executor::BatchExecutor;
pub use mapping::{MappingSet, MappingSlot, SetMappingOutcome};
pub use session::{ImportSession, ImportStage};
pub use suggester::{HybridAnalyzer, MappingSuggester, SuggestionRequest, SuggestionResponse};
pub use text_parser::parse_document;
pub use validator::validate_rows;
