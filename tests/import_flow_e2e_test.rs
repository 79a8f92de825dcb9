// ==========================================
// 导入流程端到端测试
// ==========================================
// 覆盖: 上传 -> 自动映射 -> 人工调整 -> 校验 -> 冲突处置 -> 落库
// 存储: 临时文件 SQLite 数据库
// ==========================================

mod test_helpers;

use shop_admin::config::DefaultImportConfig;
use shop_admin::{HybridAnalyzer, ImportApi, ImportDomain, RecordStore};
use std::collections::HashMap;
use std::sync::Arc;
use test_helpers::{csv, rules_api, temp_store, ScriptedSuggester};

#[tokio::test]
async fn test_clean_customer_import_end_to_end() {
    let (store, _dir) = temp_store();
    let mut api = rules_api("customers", store.clone());

    let text = csv(
        &["Customer Code", "Company Name", "City"],
        &[
            &["C001", "Acme Machining", "Dallas"],
            &["C002", "Baker Tool & Die", "Tulsa"],
            &["C003", "Crown Fabrication", "Omaha"],
        ],
    );
    let review = api.upload(&text).await.unwrap();
    assert_eq!(review.status.stage, "review");
    assert_eq!(review.total_rows, 3);
    assert!(review.summary.unmapped_required.is_empty());

    let done = api.confirm_mappings().await.unwrap();
    assert_eq!(done.status.stage, "complete");
    let outcome = done.outcome.unwrap();
    assert_eq!(outcome.imported_count, 3);
    assert_eq!(outcome.skipped_count, 0);
    assert!(outcome.row_errors.is_empty());

    assert_eq!(
        store.count_records(ImportDomain::Customers).await.unwrap(),
        3
    );
    assert!(store
        .exists(ImportDomain::Customers, "customer_code", "c002")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_quoted_fields_survive_import() {
    let (store, _dir) = temp_store();
    let mut api = rules_api("customers", store.clone());

    let text = "Customer Code,Company Name\nC001,\"Acme, Inc.\"\nC002,\"Baker \"\"BT\"\" Tool\"\n";
    api.upload(text).await.unwrap();
    let done = api.confirm_mappings().await.unwrap();
    assert_eq!(done.outcome.unwrap().imported_count, 2);

    // 引号内逗号不拆分
    assert!(store
        .exists(ImportDomain::Customers, "name", "Acme, Inc.")
        .await
        .unwrap()
        .is_some());
    assert!(store
        .exists(ImportDomain::Customers, "name", r#"Baker "BT" Tool"#)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_conflicts_skipped_and_rest_imported() {
    let (store, _dir) = temp_store();
    let mut api = rules_api("parts", store.clone());

    // 行 1/3 批内键重复, 行 4 缺必填字段
    let text = csv(
        &["Part Number", "Description"],
        &[
            &["P-100", "Bracket"],
            &["P-200", "Housing"],
            &["p-100", "Bracket rev B"],
            &["", "No part number"],
            &["P-300", "Shaft"],
        ],
    );
    api.upload(&text).await.unwrap();

    let confirmed = api.confirm_mappings().await.unwrap();
    assert_eq!(confirmed.status.stage, "conflicts");
    let report = confirmed.report.unwrap();
    assert_eq!(report.conflict_rows_count, 2);
    assert_eq!(report.error_rows_count, 1);
    assert_eq!(report.affected_rows_count, 3);
    assert_eq!(report.valid_rows_count, 2);

    let done = api.proceed_skipping_conflicts().await.unwrap();
    let outcome = done.outcome.unwrap();
    assert_eq!(outcome.imported_count, 2);
    assert_eq!(outcome.skipped_count, 3);
    assert_eq!(store.count_records(ImportDomain::Parts).await.unwrap(), 2);
    // 冲突行未落库
    assert!(store
        .exists(ImportDomain::Parts, "part_number", "P-100")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_reimport_same_file_flags_store_duplicates() {
    let (store, _dir) = temp_store();
    let text = csv(
        &["Part Number", "Description"],
        &[&["P-1", "a"], &["P-2", "b"]],
    );

    let mut first = rules_api("parts", store.clone());
    first.upload(&text).await.unwrap();
    first.confirm_mappings().await.unwrap();
    assert_eq!(store.count_records(ImportDomain::Parts).await.unwrap(), 2);

    // 同文件再导: 全部行命中存量重复
    let mut second = rules_api("parts", store.clone());
    second.upload(&text).await.unwrap();
    let confirmed = second.confirm_mappings().await.unwrap();
    assert_eq!(confirmed.status.stage, "conflicts");
    let report = confirmed.report.unwrap();
    assert_eq!(report.affected_rows_count, 2);
    assert_eq!(report.valid_rows_count, 0);

    let done = second.proceed_skipping_conflicts().await.unwrap();
    let outcome = done.outcome.unwrap();
    assert_eq!(outcome.imported_count, 0);
    assert_eq!(outcome.skipped_count, 2);
    assert_eq!(store.count_records(ImportDomain::Parts).await.unwrap(), 2);
}

#[tokio::test]
async fn test_manual_mapping_then_import() {
    let (store, _dir) = temp_store();
    let mut api = rules_api("inventory", store.clone());

    // 表头无法自动识别, 人工指定
    let text = csv(
        &["Col 1", "Col 2"],
        &[&["CNC Lathe 1", "85.5"], &["Manual Mill", "60"]],
    );
    api.upload(&text).await.unwrap();

    api.set_mapping("Col 1", Some("name")).unwrap();
    api.set_mapping("Col 2", Some("labor_rate")).unwrap();
    let done = api.confirm_mappings().await.unwrap();
    assert_eq!(done.status.stage, "complete");
    assert_eq!(done.outcome.unwrap().imported_count, 2);
    assert!(store
        .exists(ImportDomain::Inventory, "name", "cnc lathe 1")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_external_suggester_resolves_uncertain_columns() {
    let (store, _dir) = temp_store();
    let answers: HashMap<String, String> =
        [("custom_field_1".to_string(), "notes".to_string())]
            .into_iter()
            .collect();
    let mut api = ImportApi::new(
        "parts",
        store.clone(),
        HybridAnalyzer::new(Some(Arc::new(ScriptedSuggester { answers }))),
        Arc::new(DefaultImportConfig::default()),
    )
    .unwrap();

    let text = csv(
        &["Part Number", "custom_field_1"],
        &[&["P-1", "heat treated"], &["P-2", "anodized"]],
    );
    let review = api.upload(&text).await.unwrap();

    let custom = review
        .mappings
        .iter()
        .find(|m| m.source_column == "custom_field_1")
        .unwrap();
    assert_eq!(custom.target_field.as_deref(), Some("notes"));

    let done = api.confirm_mappings().await.unwrap();
    assert_eq!(done.outcome.unwrap().imported_count, 2);
}

#[tokio::test]
async fn test_reset_allows_fresh_import() {
    let (store, _dir) = temp_store();
    let mut api = rules_api("parts", store.clone());

    api.upload(&csv(&["Part Number"], &[&["P-1"]]))
        .await
        .unwrap();
    let status = api.reset();
    assert_eq!(status.stage, "upload");

    api.upload(&csv(&["Part Number"], &[&["P-9"]]))
        .await
        .unwrap();
    let done = api.confirm_mappings().await.unwrap();
    assert_eq!(done.outcome.unwrap().imported_count, 1);
    assert_eq!(store.count_records(ImportDomain::Parts).await.unwrap(), 1);
}
