// ==========================================
// 车间管理系统 - API 层
// ==========================================
// 职责: 面向前端/CLI 的请求-响应接口
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{
    ConfirmResponse, ImportApi, ReviewResponse, SessionStatus, SetMappingResponse,
    ValidationSummary,
};
