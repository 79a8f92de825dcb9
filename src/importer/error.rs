// ==========================================
// 车间管理系统 - 导入管道错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use crate::config::ConfigError;
use thiserror::Error;

/// 导入管道错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 解析错误 =====
    #[error("输入为空: 文件无表头行")]
    EmptyInput,

    // ===== 映射建议错误 =====
    #[error("映射建议服务调用失败: {0}")]
    SuggestionFailed(String),

    #[error("映射建议服务调用超时")]
    SuggestionTimeout,

    // ===== 映射编辑错误 =====
    #[error("未知源列: {0}")]
    UnknownColumn(String),

    #[error("未知或禁用的目标字段: {0}")]
    UnknownField(String),

    #[error("改派请求已失效: 目标字段的认领关系已变化")]
    StaleReassignment,

    #[error("必填字段未映射: {0:?}")]
    UnmappedRequired(Vec<String>),

    // ===== 会话状态机错误 =====
    #[error("非法状态转换: 当前阶段 {stage} 不接受事件 {event}")]
    InvalidTransition { stage: String, event: &'static str },

    // ===== 校验阶段错误 =====
    #[error("存量记录查询失败: {0}")]
    LookupFailed(String),

    #[error("存量记录查询超时")]
    LookupTimeout,

    // ===== 通用错误 =====
    #[error("配置读取失败: {0}")]
    ConfigReadError(String),

    #[error("操作已取消")]
    Cancelled,

    #[error("内部错误: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 配置读取错误折叠为 ConfigReadError
impl From<ConfigError> for ImportError {
    fn from(err: ConfigError) -> Self {
        ImportError::ConfigReadError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
