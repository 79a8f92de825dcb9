// ==========================================
// 分块执行器集成测试
// ==========================================
// 覆盖: 分块口径、跳过行、块级致命失败的部分提交语义
// ==========================================

mod test_helpers;

use shop_admin::importer::{BatchExecutor, MappingSet};
use shop_admin::{ImportDomain, Row};
use std::collections::BTreeSet;
use test_helpers::ChunkCountingStore;
use tokio_util::sync::CancellationToken;

fn parts_mappings() -> MappingSet {
    let headers = vec!["pn".to_string()];
    let mut set = MappingSet::new(ImportDomain::Parts, &headers);
    set.set_mapping("pn", Some("part_number")).unwrap();
    set
}

fn batch(count: u32) -> Vec<Row> {
    (1..=count)
        .map(|i| Row {
            row_number: i,
            cells: vec![format!("P-{}", i)],
        })
        .collect()
}

#[tokio::test]
async fn test_chunk_count_is_ceil() {
    // 10 行 / 块大小 3 -> 4 次提交: 3,3,3,1
    let store = ChunkCountingStore::new(None);
    let outcome = BatchExecutor::execute(
        &parts_mappings(),
        &batch(10),
        &BTreeSet::new(),
        3,
        &store,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.imported_count, 10);
    assert_eq!(*store.chunk_sizes.lock().unwrap(), vec![3, 3, 3, 1]);
}

#[tokio::test]
async fn test_exact_multiple_has_no_trailing_chunk() {
    let store = ChunkCountingStore::new(None);
    BatchExecutor::execute(
        &parts_mappings(),
        &batch(6),
        &BTreeSet::new(),
        3,
        &store,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(*store.chunk_sizes.lock().unwrap(), vec![3, 3]);
}

#[tokio::test]
async fn test_skip_rows_reduce_chunks() {
    // 10 行跳过 3 行 -> 7 行提交
    let store = ChunkCountingStore::new(None);
    let skip: BTreeSet<u32> = [2, 5, 9].into_iter().collect();
    let outcome = BatchExecutor::execute(
        &parts_mappings(),
        &batch(10),
        &skip,
        500,
        &store,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.imported_count, 7);
    assert_eq!(outcome.skipped_count, 3);
    assert_eq!(*store.chunk_sizes.lock().unwrap(), vec![7]);
}

#[tokio::test]
async fn test_fatal_chunk_aborts_later_chunks() {
    // 块 0/1 成功, 块 2 致命 -> 块 3 不提交
    let store = ChunkCountingStore::new(Some(2));
    let outcome = BatchExecutor::execute(
        &parts_mappings(),
        &batch(8),
        &BTreeSet::new(),
        2,
        &store,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.imported_count, 4);
    assert_eq!(*store.chunk_sizes.lock().unwrap(), vec![2, 2]);

    let aborted = outcome.aborted.unwrap();
    assert_eq!(aborted.chunk_index, 2);

    // 致命块与后续块的行全部进入行级失败
    let failed: Vec<u32> = outcome.row_errors.iter().map(|e| e.row_number).collect();
    assert_eq!(failed, vec![5, 6, 7, 8]);

    // 三种口径合计覆盖全部行
    assert_eq!(
        outcome.imported_count + outcome.skipped_count + outcome.row_errors.len(),
        8
    );
}
