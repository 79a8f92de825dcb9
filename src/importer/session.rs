// ==========================================
// 车间管理系统 - 导入会话状态机
// ==========================================
// 职责: 串起解析 -> 分析 -> 复核 -> 校验 -> 冲突处置 -> 落库的完整流程
// 红线: 非法事件只报错不改状态；异步步骤进行中状态持有完整数据，
//       调用方中途放弃不会留下半初始化的会话
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::import::{
    ImportOutcome, MappingSummary, ParsedDocument, ReassignmentRequest, Row, ValidationReport,
};
use crate::domain::types::ImportDomain;
use crate::repository::RecordStore;
use std::collections::BTreeSet;
use std::mem;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::error::{ImportError, ImportResult};
use super::executor::BatchExecutor;
use super::mapping::{MappingSet, SetMappingOutcome};
use super::suggester::HybridAnalyzer;
use super::text_parser;
use super::validator;

// ==========================================
// ImportStage - 会话阶段
// ==========================================
/// 会话所处阶段，数据随阶段携带
///
/// Upload 可携带上一次解析成功的文档（分析失败后回退时保留，
/// 供 retry_analysis 复用而无需重新上传）。
#[derive(Debug)]
pub enum ImportStage {
    Upload { parsed: Option<ParsedDocument> },
    Analyzing { doc: ParsedDocument },
    Review { doc: ParsedDocument, mappings: MappingSet },
    Validating { doc: ParsedDocument, mappings: MappingSet },
    Conflicts {
        doc: ParsedDocument,
        mappings: MappingSet,
        report: ValidationReport,
    },
    Importing { doc: ParsedDocument, mappings: MappingSet },
    Complete { outcome: ImportOutcome },
}

impl ImportStage {
    pub fn name(&self) -> &'static str {
        match self {
            ImportStage::Upload { .. } => "upload",
            ImportStage::Analyzing { .. } => "analyzing",
            ImportStage::Review { .. } => "review",
            ImportStage::Validating { .. } => "validating",
            ImportStage::Conflicts { .. } => "conflicts",
            ImportStage::Importing { .. } => "importing",
            ImportStage::Complete { .. } => "complete",
        }
    }
}

// ==========================================
// ImportSession
// ==========================================
/// 一次导入会话（单域、单文件、进程内）
pub struct ImportSession {
    domain: ImportDomain,
    stage: ImportStage,
    error: Option<String>,
    store: Arc<dyn RecordStore>,
    analyzer: HybridAnalyzer,
    config: Arc<dyn ImportConfigReader>,
    cancel: CancellationToken,
}

impl ImportSession {
    pub fn new(
        domain: ImportDomain,
        store: Arc<dyn RecordStore>,
        analyzer: HybridAnalyzer,
        config: Arc<dyn ImportConfigReader>,
    ) -> Self {
        Self {
            domain,
            stage: ImportStage::Upload { parsed: None },
            error: None,
            store,
            analyzer,
            config,
            cancel: CancellationToken::new(),
        }
    }

    // ===== 状态访问 =====

    pub fn domain(&self) -> ImportDomain {
        self.domain
    }

    pub fn stage(&self) -> &ImportStage {
        &self.stage
    }

    pub fn stage_name(&self) -> &'static str {
        self.stage.name()
    }

    /// 最近一次失败的可读信息（成功的状态转换会清掉）
    pub fn last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn parsed_document(&self) -> Option<&ParsedDocument> {
        match &self.stage {
            ImportStage::Upload { parsed } => parsed.as_ref(),
            ImportStage::Analyzing { doc }
            | ImportStage::Review { doc, .. }
            | ImportStage::Validating { doc, .. }
            | ImportStage::Conflicts { doc, .. }
            | ImportStage::Importing { doc, .. } => Some(doc),
            ImportStage::Complete { .. } => None,
        }
    }

    pub fn mappings(&self) -> Option<&MappingSet> {
        match &self.stage {
            ImportStage::Review { mappings, .. }
            | ImportStage::Validating { mappings, .. }
            | ImportStage::Conflicts { mappings, .. }
            | ImportStage::Importing { mappings, .. } => Some(mappings),
            _ => None,
        }
    }

    pub fn mapping_summary(&self) -> Option<MappingSummary> {
        self.mappings().map(|m| m.summary())
    }

    pub fn validation_report(&self) -> Option<&ValidationReport> {
        match &self.stage {
            ImportStage::Conflicts { report, .. } => Some(report),
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<&ImportOutcome> {
        match &self.stage {
            ImportStage::Complete { outcome } => Some(outcome),
            _ => None,
        }
    }

    // ===== 事件: 上传与分析 =====

    /// 接收文件内容，解析后进入分析
    ///
    /// 仅 upload 阶段可用；解析失败停留在 upload 并记录错误。
    pub async fn select_file(&mut self, text: &str) -> ImportResult<()> {
        if !matches!(self.stage, ImportStage::Upload { .. }) {
            return Err(self.reject("select_file"));
        }

        let doc = match text_parser::parse_document(text) {
            Ok(doc) => doc,
            Err(e) => {
                self.error = Some(e.to_string());
                return Err(e);
            }
        };

        info!(domain = %self.domain, rows = doc.total_rows(), columns = doc.headers.len(), "文件解析完成");
        self.error = None;
        self.stage = ImportStage::Analyzing { doc };
        self.run_analysis().await
    }

    /// 分析失败后用已解析文档重试
    pub async fn retry_analysis(&mut self) -> ImportResult<()> {
        match &self.stage {
            ImportStage::Upload { parsed: Some(_) } => {}
            _ => return Err(self.reject("retry_analysis")),
        }
        let ImportStage::Upload { parsed: Some(doc) } = self.take_stage() else {
            return Err(ImportError::Internal("阶段数据丢失".to_string()));
        };
        self.stage = ImportStage::Analyzing { doc };
        self.run_analysis().await
    }

    /// 运行混合映射分析，成功进入 review，失败回退 upload（保留文档）
    async fn run_analysis(&mut self) -> ImportResult<()> {
        let params = async {
            Ok::<_, ImportError>((
                self.config.get_needs_review_threshold().await?,
                self.config.get_sample_row_count().await?,
            ))
        }
        .await;
        let (threshold, sample_count) = match params {
            Ok(v) => v,
            Err(e) => {
                self.demote_to_upload(e.to_string());
                return Err(e);
            }
        };

        // 分析进行中阶段持有完整文档; 此块内只读借用会话
        let result = {
            let ImportStage::Analyzing { doc } = &self.stage else {
                return Err(self.reject("analyze"));
            };
            let samples: Vec<Row> = doc.rows.iter().take(sample_count).cloned().collect();
            self.analyzer
                .analyze(self.domain, &doc.headers, &samples, self.config.as_ref())
                .await
        };

        match result {
            Ok(response) => {
                let ImportStage::Analyzing { doc } = self.take_stage() else {
                    return Err(ImportError::Internal("阶段数据丢失".to_string()));
                };
                let mut mappings = MappingSet::new(self.domain, &doc.headers);
                mappings.absorb_suggestions(response.mappings, threshold);
                self.error = None;
                self.stage = ImportStage::Review { doc, mappings };
                Ok(())
            }
            Err(e) => {
                warn!(domain = %self.domain, error = %e, "映射分析失败, 回退到上传阶段");
                self.demote_to_upload(e.to_string());
                Err(e)
            }
        }
    }

    // ===== 事件: 映射编辑 =====

    /// 人工调整一个列映射（仅 review 阶段）
    pub fn set_mapping(
        &mut self,
        source_column: &str,
        target_field: Option<&str>,
    ) -> ImportResult<SetMappingOutcome> {
        match &mut self.stage {
            ImportStage::Review { mappings, .. } => mappings.set_mapping(source_column, target_field),
            _ => Err(self.reject("set_mapping")),
        }
    }

    /// 确认一次字段改派（仅 review 阶段）
    pub fn confirm_reassignment(&mut self, request: &ReassignmentRequest) -> ImportResult<()> {
        match &mut self.stage {
            ImportStage::Review { mappings, .. } => mappings.confirm_reassignment(request),
            _ => Err(self.reject("confirm_reassignment")),
        }
    }

    // ===== 事件: 确认映射进入校验 =====

    /// 确认映射，运行校验；干净批次直接落库
    ///
    /// 必填字段未全部映射时原地拒绝，不改状态。
    pub async fn confirm_mappings(&mut self) -> ImportResult<()> {
        let unmapped_required = match &self.stage {
            ImportStage::Review { mappings, .. } => mappings.summary().unmapped_required,
            _ => return Err(self.reject("confirm_mappings")),
        };
        if !unmapped_required.is_empty() {
            return Err(ImportError::UnmappedRequired(unmapped_required));
        }

        let ImportStage::Review { doc, mappings } = self.take_stage() else {
            return Err(ImportError::Internal("阶段数据丢失".to_string()));
        };
        self.stage = ImportStage::Validating { doc, mappings };

        let result = {
            let ImportStage::Validating { doc, mappings } = &self.stage else {
                return Err(ImportError::Internal("阶段数据丢失".to_string()));
            };
            validator::validate_rows(
                mappings,
                &doc.rows,
                self.store.as_ref(),
                self.config.as_ref(),
                &self.cancel,
            )
            .await
        };

        let ImportStage::Validating { doc, mappings } = self.take_stage() else {
            return Err(ImportError::Internal("阶段数据丢失".to_string()));
        };
        match result {
            Ok(report) if report.is_clean() => {
                self.error = None;
                self.stage = ImportStage::Importing { doc, mappings };
                self.run_import(BTreeSet::new()).await
            }
            Ok(report) => {
                self.error = None;
                self.stage = ImportStage::Conflicts { doc, mappings, report };
                Ok(())
            }
            Err(e) => {
                self.error = Some(e.to_string());
                self.stage = ImportStage::Review { doc, mappings };
                Err(e)
            }
        }
    }

    // ===== 事件: 冲突处置 =====

    /// 跳过所有冲突/错误行，提交其余行
    pub async fn proceed_skipping_conflicts(&mut self) -> ImportResult<()> {
        if !matches!(self.stage, ImportStage::Conflicts { .. }) {
            return Err(self.reject("proceed_skipping_conflicts"));
        }
        let ImportStage::Conflicts { doc, mappings, report } = self.take_stage() else {
            return Err(ImportError::Internal("阶段数据丢失".to_string()));
        };

        let skip_rows = report.affected_rows();
        info!(domain = %self.domain, skipped = skip_rows.len(), "跳过受影响行, 继续落库");
        self.stage = ImportStage::Importing { doc, mappings };
        self.run_import(skip_rows).await
    }

    /// 放弃本次冲突处置，回到映射复核
    pub fn cancel_conflicts(&mut self) -> ImportResult<()> {
        if !matches!(self.stage, ImportStage::Conflicts { .. }) {
            return Err(self.reject("cancel_conflicts"));
        }
        let ImportStage::Conflicts { doc, mappings, .. } = self.take_stage() else {
            return Err(ImportError::Internal("阶段数据丢失".to_string()));
        };
        self.stage = ImportStage::Review { doc, mappings };
        Ok(())
    }

    // ===== 落库 =====

    /// 执行落库并进入 complete（带错误的结果也算完成）
    async fn run_import(&mut self, skip_rows: BTreeSet<u32>) -> ImportResult<()> {
        let chunk_size = match self.config.get_chunk_size().await {
            Ok(size) => size,
            Err(e) => {
                let e = ImportError::from(e);
                self.restore_review_with_error(e.to_string())?;
                return Err(e);
            }
        };

        let result = {
            let ImportStage::Importing { doc, mappings } = &self.stage else {
                return Err(self.reject("import"));
            };
            BatchExecutor::execute(
                mappings,
                &doc.rows,
                &skip_rows,
                chunk_size,
                self.store.as_ref(),
                &self.cancel,
            )
            .await
        };

        match result {
            Ok(outcome) => {
                self.error = None;
                self.stage = ImportStage::Complete { outcome };
                Ok(())
            }
            Err(e) => {
                self.restore_review_with_error(e.to_string())?;
                Err(e)
            }
        }
    }

    // ===== 事件: 复位 =====

    /// 复位会话到初始上传阶段
    ///
    /// 任何阶段可用；进行中的异步步骤通过取消令牌尽快停下。
    pub fn reset(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.stage = ImportStage::Upload { parsed: None };
        self.error = None;
        info!(domain = %self.domain, "会话已复位");
    }

    // ===== 内部工具 =====

    fn take_stage(&mut self) -> ImportStage {
        mem::replace(&mut self.stage, ImportStage::Upload { parsed: None })
    }

    fn reject(&self, event: &'static str) -> ImportError {
        ImportError::InvalidTransition {
            stage: self.stage_name().to_string(),
            event,
        }
    }

    fn demote_to_upload(&mut self, message: String) {
        self.error = Some(message);
        match self.take_stage() {
            ImportStage::Analyzing { doc } => {
                self.stage = ImportStage::Upload { parsed: Some(doc) };
            }
            other => self.stage = other,
        }
    }

    fn restore_review_with_error(&mut self, message: String) -> ImportResult<()> {
        self.error = Some(message);
        match self.take_stage() {
            ImportStage::Importing { doc, mappings } => {
                self.stage = ImportStage::Review { doc, mappings };
                Ok(())
            }
            other => {
                self.stage = other;
                Err(ImportError::Internal("阶段数据丢失".to_string()))
            }
        }
    }
}
