// ==========================================
// 车间管理系统 - 导入业务接口
// ==========================================
// 职责: 包装导入会话为面向前端/CLI 的请求-响应接口
// 红线: 只做 DTO 组装与入参检查，业务规则全部在会话与引擎内
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::import::{
    ColumnMapping, ImportOutcome, MappingSummary, ReassignmentRequest, ValidationReport,
};
use crate::domain::types::ImportDomain;
use crate::importer::{HybridAnalyzer, ImportSession, SetMappingOutcome};
use crate::repository::RecordStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ApiResult};

// ==========================================
// 响应 DTO
// ==========================================
/// 会话状态快照（所有接口都附带）
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub domain: ImportDomain,
    pub stage: String,
    pub last_error: Option<String>,
}

/// 上传/分析后的复核视图
#[derive(Debug, Clone, Serialize)]
pub struct ReviewResponse {
    pub status: SessionStatus,
    pub total_rows: usize,
    pub mappings: Vec<ColumnMapping>,
    pub summary: MappingSummary,
}

/// set_mapping 的结果视图
#[derive(Debug, Clone, Serialize)]
pub struct SetMappingResponse {
    pub status: SessionStatus,
    pub applied: bool,
    /// 非空时需人工确认改派后重试
    pub reassignment: Option<ReassignmentRequest>,
    pub summary: MappingSummary,
}

/// 确认映射后的结果: 进入冲突处置或直接完成
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmResponse {
    pub status: SessionStatus,
    pub report: Option<ValidationSummary>,
    pub outcome: Option<ImportOutcome>,
}

/// 校验报告的展示口径
#[derive(Debug, Clone, Serialize)]
pub struct ValidationSummary {
    pub valid_rows_count: usize,
    /// 受影响行数（冲突行与错误行的并集）
    pub affected_rows_count: usize,
    pub conflict_rows_count: usize,
    pub error_rows_count: usize,
    pub report: ValidationReport,
}

impl ValidationSummary {
    fn from_report(report: &ValidationReport) -> Self {
        Self {
            valid_rows_count: report.valid_rows_count,
            affected_rows_count: report.affected_rows().len(),
            conflict_rows_count: report.conflict_rows_count(),
            error_rows_count: report.error_rows_count(),
            report: report.clone(),
        }
    }
}

// ==========================================
// ImportApi
// ==========================================
/// 单域导入接口（一个实例对应一次导入会话）
pub struct ImportApi {
    session: ImportSession,
}

impl ImportApi {
    /// 创建导入接口
    ///
    /// # 参数
    /// - domain: 导入域名称（customers / parts / inventory）
    pub fn new(
        domain: &str,
        store: Arc<dyn RecordStore>,
        analyzer: HybridAnalyzer,
        config: Arc<dyn ImportConfigReader>,
    ) -> ApiResult<Self> {
        let domain = ImportDomain::parse(domain)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知导入域: {}", domain)))?;
        info!(domain = %domain, "创建导入会话");
        Ok(Self {
            session: ImportSession::new(domain, store, analyzer, config),
        })
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            domain: self.session.domain(),
            stage: self.session.stage_name().to_string(),
            last_error: self.session.last_error().map(|e| e.to_string()),
        }
    }

    /// 上传文件内容并运行映射分析
    pub async fn upload(&mut self, text: &str) -> ApiResult<ReviewResponse> {
        self.session.select_file(text).await?;
        self.review_view()
    }

    /// 分析失败后重试（复用已解析文档）
    pub async fn retry_analysis(&mut self) -> ApiResult<ReviewResponse> {
        self.session.retry_analysis().await?;
        self.review_view()
    }

    /// 人工调整列映射
    pub fn set_mapping(
        &mut self,
        source_column: &str,
        target_field: Option<&str>,
    ) -> ApiResult<SetMappingResponse> {
        let outcome = self.session.set_mapping(source_column, target_field)?;
        let (applied, reassignment) = match outcome {
            SetMappingOutcome::Applied => (true, None),
            SetMappingOutcome::ReassignmentRequired(request) => (false, Some(request)),
        };
        Ok(SetMappingResponse {
            status: self.status(),
            applied,
            reassignment,
            summary: self.current_summary()?,
        })
    }

    /// 确认字段改派
    pub fn confirm_reassignment(
        &mut self,
        request: &ReassignmentRequest,
    ) -> ApiResult<SetMappingResponse> {
        self.session.confirm_reassignment(request)?;
        Ok(SetMappingResponse {
            status: self.status(),
            applied: true,
            reassignment: None,
            summary: self.current_summary()?,
        })
    }

    /// 确认映射: 干净批次直接落库完成，否则停在冲突处置
    pub async fn confirm_mappings(&mut self) -> ApiResult<ConfirmResponse> {
        self.session.confirm_mappings().await?;
        Ok(self.confirm_view())
    }

    /// 跳过受影响行并完成落库
    pub async fn proceed_skipping_conflicts(&mut self) -> ApiResult<ConfirmResponse> {
        self.session.proceed_skipping_conflicts().await?;
        Ok(self.confirm_view())
    }

    /// 放弃冲突处置, 回到映射复核
    pub fn cancel_conflicts(&mut self) -> ApiResult<ReviewResponse> {
        self.session.cancel_conflicts()?;
        self.review_view()
    }

    /// 复位会话
    pub fn reset(&mut self) -> SessionStatus {
        self.session.reset();
        self.status()
    }

    // ===== 视图组装 =====

    fn review_view(&self) -> ApiResult<ReviewResponse> {
        let total_rows = self
            .session
            .parsed_document()
            .map(|doc| doc.total_rows())
            .unwrap_or(0);
        Ok(ReviewResponse {
            status: self.status(),
            total_rows,
            mappings: self
                .session
                .mappings()
                .map(|m| m.mappings().into_iter().cloned().collect())
                .unwrap_or_default(),
            summary: self.current_summary()?,
        })
    }

    fn current_summary(&self) -> ApiResult<MappingSummary> {
        self.session.mapping_summary().ok_or_else(|| {
            ApiError::InvalidInput(format!(
                "当前阶段无映射集合: {}",
                self.session.stage_name()
            ))
        })
    }

    fn confirm_view(&self) -> ConfirmResponse {
        ConfirmResponse {
            status: self.status(),
            report: self.session.validation_report().map(ValidationSummary::from_report),
            outcome: self.session.outcome().cloned(),
        }
    }
}
