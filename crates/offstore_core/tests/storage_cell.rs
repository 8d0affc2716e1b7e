//! Storage cell behaviour over real connections.

use offstore_core::{
    open_database, CellConfig, CoreError, DatabaseConfig, DirectoryProvider, ErrorCode,
    Expiration, Key, MemoryProvider, Severity, StorageCell,
};
use offstore_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

fn assert_key_not_found<T: std::fmt::Debug>(result: Result<T, CoreError>) {
    let err = result.expect_err("expected KeyNotFound");
    assert_eq!(err.code(), ErrorCode::KeyNotFound, "unexpected error: {err}");
    assert_eq!(err.severity(), Severity::Critical);
}

#[tokio::test]
async fn can_add_get_and_remove_segments() {
    let storage = TestStorage::memory();
    let cell = storage.cell();
    let segments = vec![
        create_segment_data(&[0]),
        create_segment_data(&[0, 1]),
        create_segment_data(&[0, 1, 2]),
    ];

    let keys = cell.add_segments(&segments).await.unwrap();
    assert_eq!(keys.len(), segments.len());
    let distinct: BTreeSet<Key> = keys.iter().copied().collect();
    assert_eq!(distinct.len(), 3);

    let found = cell.get_segments(&keys).await.unwrap();
    assert_eq!(found, segments);

    cell.remove_segments(&keys, |_| {}).await.unwrap();
    assert_key_not_found(cell.get_segments(&keys).await);
    cell.destroy().await;
}

#[tokio::test]
async fn can_add_get_and_remove_manifests() {
    let storage = TestStorage::memory();
    let cell = storage.cell();
    let manifests = vec![
        create_manifest("original-uri-1"),
        create_manifest("original-uri-2"),
        create_manifest("original-uri-3"),
    ];

    let keys = cell.add_manifests(&manifests).await.unwrap();
    assert_eq!(keys.len(), manifests.len());

    let found = cell.get_manifests(&keys).await.unwrap();
    assert_eq!(found, manifests);

    cell.remove_manifests(&keys, |_| {}).await.unwrap();
    assert_key_not_found(cell.get_manifests(&keys).await);
}

#[tokio::test]
async fn can_add_and_get_all_manifests() {
    let storage = TestStorage::memory();
    let cell = storage.cell();
    let manifests = vec![
        create_manifest("original-uri-1"),
        create_manifest("original-uri-2"),
        create_manifest("original-uri-3"),
    ];

    let keys = cell.add_manifests(&manifests).await.unwrap();
    let all = cell.get_all_manifests().await.unwrap();

    assert_eq!(all.len(), manifests.len());
    for (key, manifest) in keys.iter().zip(&manifests) {
        assert_eq!(all.get(key), Some(manifest));
    }
}

#[tokio::test]
async fn can_add_get_and_update_manifests() {
    let storage = TestStorage::memory();
    let cell = storage.cell();
    let mut original = create_manifest("original");
    original.expiration = Expiration::from_millis(1000);

    let keys = cell.add_manifests(&[original.clone()]).await.unwrap();
    assert_eq!(keys.len(), 1);
    let key = keys[0];
    assert_eq!(cell.get_manifests(&keys).await.unwrap(), vec![original.clone()]);

    cell.update_manifest_expiration(key, Expiration::from_millis(500))
        .await
        .unwrap();
    let updated = cell.get_manifests(&[key]).await.unwrap();
    assert_ne!(updated[0], original);

    original.expiration = Expiration::from_millis(500);
    assert_eq!(updated[0], original);
}

#[tokio::test]
async fn get_fails_on_first_missing_key_without_partial_result() {
    let storage = TestStorage::memory();
    let cell = storage.cell();
    let keys = cell
        .add_segments(&[create_segment_data(&[1]), create_segment_data(&[2])])
        .await
        .unwrap();
    cell.remove_segments(&keys[1..], |_| {}).await.unwrap();

    let missing = keys[1];
    let request = [keys[0], missing, Key::from_raw(missing.as_u64() + 100)];
    match cell.get_segments(&request).await {
        Err(CoreError::KeyNotFound { key, store }) => {
            assert_eq!(key, missing);
            assert_eq!(store, storage.config().segment_store);
        }
        other => panic!("expected KeyNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn removing_missing_or_removed_keys_succeeds() {
    let storage = TestStorage::memory();
    let cell = storage.cell();
    let keys = cell.add_segments(&[create_segment_data(&[9])]).await.unwrap();

    cell.remove_segments(&keys, |_| {}).await.unwrap();
    cell.remove_segments(&keys, |_| {}).await.unwrap();
    cell.remove_segments(&[Key::from_raw(12_345)], |_| {})
        .await
        .unwrap();
    cell.remove_manifests(&[Key::from_raw(1)], |_| {})
        .await
        .unwrap();
}

#[tokio::test]
async fn remove_reports_each_key_in_order() {
    let storage = TestStorage::memory();
    let cell = storage.cell();
    let mut keys = cell
        .add_manifests(&[create_manifest("a"), create_manifest("b")])
        .await
        .unwrap();
    keys.reverse();
    keys.push(Key::from_raw(999));

    let mut reported = Vec::new();
    cell.remove_manifests(&keys, |key| reported.push(key))
        .await
        .unwrap();
    assert_eq!(reported, keys);
    assert!(cell.get_all_manifests().await.unwrap().is_empty());
}

#[tokio::test]
async fn update_of_missing_manifest_fails() {
    let storage = TestStorage::memory();
    let cell = storage.cell();
    assert_key_not_found(
        cell.update_manifest_expiration(Key::from_raw(1), Expiration::from_millis(5))
            .await,
    );
}

#[tokio::test]
async fn update_after_remove_does_not_resurrect() {
    let storage = TestStorage::memory();
    let cell = storage.cell();
    let keys = cell.add_manifests(&[create_manifest("gone")]).await.unwrap();

    cell.remove_manifests(&keys, |_| {}).await.unwrap();
    assert_key_not_found(
        cell.update_manifest_expiration(keys[0], Expiration::from_millis(1))
            .await,
    );
    assert!(cell.get_all_manifests().await.unwrap().is_empty());
}

#[tokio::test]
async fn read_only_cell_rejects_writes() {
    let storage = TestStorage::memory();
    let writer = storage.cell();
    let manifest_keys = writer.add_manifests(&[create_manifest("kept")]).await.unwrap();

    let cell = storage.read_only_cell();
    let err = cell
        .add_segments(&[create_segment_data(&[0, 1])])
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::OperationNotSupported);
    assert!(matches!(
        cell.update_manifest_expiration(manifest_keys[0], Expiration::from_millis(1))
            .await,
        Err(CoreError::OperationNotSupported { .. })
    ));
    assert!(matches!(
        cell.remove_manifests(&manifest_keys, |_| {}).await,
        Err(CoreError::OperationNotSupported { .. })
    ));

    let connection = storage.connection();
    let read = connection
        .begin_read(&[storage.config().segment_store.as_str()])
        .unwrap();
    assert_eq!(read.count(&storage.config().segment_store).unwrap(), 0);
    assert_eq!(cell.get_manifests(&manifest_keys).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_store_fails_on_first_operation() {
    let storage = TestStorage::memory();
    let cell = storage.cell_with(CellConfig::new("no-such-segments", "manifest-store"));

    let err = cell
        .add_segments(&[create_segment_data(&[1])])
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::StoreNotFound);
    assert!(matches!(err, CoreError::StoreNotFound { ref name } if name == "no-such-segments"));
    assert!(cell.add_manifests(&[create_manifest("ok")]).await.is_ok());
}

#[tokio::test]
async fn destroyed_cell_rejects_everything_but_keeps_data() {
    let storage = TestStorage::memory();
    let cell = storage.cell();
    let keys = cell.add_segments(&[create_segment_data(&[4])]).await.unwrap();

    cell.destroy().await;
    cell.destroy().await;

    assert!(matches!(
        cell.get_segments(&keys).await,
        Err(CoreError::Destroyed)
    ));
    assert!(matches!(
        cell.add_manifests(&[create_manifest("x")]).await,
        Err(CoreError::Destroyed)
    ));
    assert!(matches!(
        cell.remove_segments(&keys, |_| {}).await,
        Err(CoreError::Destroyed)
    ));
    assert!(matches!(
        cell.update_manifest_expiration(Key::from_raw(1), Expiration::NEVER)
            .await,
        Err(CoreError::Destroyed)
    ));

    assert!(!storage.connection().is_closed());
    let other = storage.cell();
    assert_eq!(other.get_segments(&keys).await.unwrap().len(), 1);
}

/// Lets every spawned task on the current-thread runtime run until it blocks.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn destroy_waits_for_in_flight_operations() {
    let storage = TestStorage::memory();
    let cell = Arc::new(storage.cell());
    let connection = storage.connection();
    let segment_store = storage.config().segment_store.clone();

    // Holding the writer slot parks the add inside the cell.
    let writer = connection
        .begin_write(&[segment_store.as_str()])
        .await
        .unwrap();
    let add = tokio::spawn({
        let cell = Arc::clone(&cell);
        async move { cell.add_segments(&[create_segment_data(&[7])]).await }
    });
    settle().await;

    let destroy = tokio::spawn({
        let cell = Arc::clone(&cell);
        async move { cell.destroy().await }
    });
    settle().await;
    assert!(!add.is_finished());
    assert!(!destroy.is_finished());

    writer.abort();
    let keys = add.await.unwrap().unwrap();
    destroy.await.unwrap();

    assert!(cell.is_destroyed().await);
    assert!(matches!(
        cell.get_segments(&keys).await,
        Err(CoreError::Destroyed)
    ));
    let read = connection.begin_read(&[segment_store.as_str()]).unwrap();
    assert_eq!(read.count(&segment_store).unwrap(), 1);
    assert_eq!(storage.cell().get_segments(&keys).await.unwrap().len(), 1);
}

#[tokio::test]
async fn commit_that_cannot_be_undone_closes_connection() {
    let provider = FaultyProvider::new();
    let name = DatabaseConfig::default().name;
    let kept = {
        let storage = TestStorage::with_provider(&provider);
        let cell = storage.cell();
        let kept = cell.add_segments(&[create_segment_data(&[1])]).await.unwrap();

        provider.switch().arm(Fault::TearWithoutUndo);
        let err = cell
            .add_segments(&[create_segment_data(&[2])])
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::StorageFailure);
        assert!(storage.connection().is_closed());

        let journal = provider.journal(&name).unwrap();
        assert!(cell.add_segments(&[create_segment_data(&[3])]).await.is_err());
        assert_eq!(provider.journal(&name).unwrap(), journal);
        kept
    };

    let storage = TestStorage::with_provider(&provider);
    let cell = storage.cell();
    assert_eq!(
        cell.get_segments(&kept).await.unwrap(),
        vec![create_segment_data(&[1])]
    );
    let connection = storage.connection();
    let read = connection
        .begin_read(&[storage.config().segment_store.as_str()])
        .unwrap();
    assert_eq!(read.count(&storage.config().segment_store).unwrap(), 1);
    assert_eq!(cell.add_segments(&[create_segment_data(&[4])]).await.unwrap().len(), 1);
}

#[tokio::test]
async fn second_connection_to_open_database_is_refused() {
    let provider = MemoryProvider::new();
    let config = DatabaseConfig::default();
    let connection = open_database(&provider, &config).unwrap();

    let err = open_database(&provider, &config).unwrap_err();
    assert_eq!(err.code(), ErrorCode::StorageFailure);
    assert_eq!(err.severity(), Severity::Recoverable);

    let first = StorageCell::new(Arc::clone(&connection), config.cell_config());
    let first_keys = first.add_segments(&[create_segment_data(&[1])]).await.unwrap();
    first.destroy().await;
    connection.close();

    let reopened = open_database(&provider, &config).unwrap();
    let second = StorageCell::new(reopened, config.cell_config());
    let second_keys = second.add_segments(&[create_segment_data(&[2])]).await.unwrap();
    assert_ne!(first_keys, second_keys);
    assert_eq!(
        second.get_segments(&first_keys).await.unwrap(),
        vec![create_segment_data(&[1])]
    );
}

#[tokio::test]
async fn cells_share_one_connection() {
    let storage = TestStorage::memory();
    let first = storage.cell();
    let second = storage.cell();

    let first_segments = [create_segment_data(&[1]), create_segment_data(&[2])];
    let second_segments = [create_segment_data(&[3])];
    let (a, b) = tokio::join!(
        first.add_segments(&first_segments),
        second.add_segments(&second_segments),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    let mut all: Vec<Key> = a.iter().chain(&b).copied().collect();
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 3);

    assert_eq!(second.get_segments(&a).await.unwrap().len(), 2);
    assert_eq!(first.get_segments(&b).await.unwrap().len(), 1);

    first.destroy().await;
    assert_eq!(second.get_segments(&b).await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_commit_leaves_no_records() {
    let provider = FaultyProvider::new();
    let storage = TestStorage::with_provider(&provider);
    let cell = storage.cell();
    let segment_store = storage.config().segment_store.clone();
    let journal_before = provider.journal(&storage.config().name).unwrap();

    for fault in [Fault::FailAppend, Fault::TearAppend, Fault::FailSync] {
        provider.switch().arm(fault);
        let err = cell
            .add_segments(&[create_segment_data(&[1]), create_segment_data(&[2])])
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::StorageFailure, "fault {fault:?}");

        let connection = storage.connection();
        let read = connection.begin_read(&[segment_store.as_str()]).unwrap();
        assert_eq!(read.count(&segment_store).unwrap(), 0, "fault {fault:?}");
        assert_eq!(
            provider.journal(&storage.config().name).unwrap(),
            journal_before,
            "fault {fault:?}"
        );
    }

    let keys = cell.add_segments(&[create_segment_data(&[3])]).await.unwrap();
    assert_eq!(cell.get_segments(&keys).await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_remove_and_update_change_nothing() {
    let provider = FaultyProvider::new();
    let storage = TestStorage::with_provider(&provider);
    let cell = storage.cell();
    let mut manifest = create_manifest("stable");
    manifest.expiration = Expiration::from_millis(1000);
    let keys = cell.add_manifests(&[manifest.clone()]).await.unwrap();

    provider.switch().arm(Fault::FailSync);
    let mut reported = 0;
    assert!(cell.remove_manifests(&keys, |_| reported += 1).await.is_err());
    assert_eq!(reported, 0);

    provider.switch().arm(Fault::FailAppend);
    assert!(cell
        .update_manifest_expiration(keys[0], Expiration::from_millis(1))
        .await
        .is_err());

    assert_eq!(cell.get_manifests(&keys).await.unwrap(), vec![manifest]);
}

#[tokio::test]
async fn directory_database_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let provider = DirectoryProvider::new(dir.path());
    let config = DatabaseConfig::default();
    let segments = vec![create_segment_data(&[0, 1, 2]), create_segment_data(&[3])];

    let (segment_keys, manifest_key) = {
        let connection = open_database(&provider, &config).unwrap();
        let cell = StorageCell::new(Arc::clone(&connection), config.cell_config());
        let segment_keys = cell.add_segments(&segments).await.unwrap();
        let manifest_keys = cell.add_manifests(&[create_manifest("disk")]).await.unwrap();
        cell.update_manifest_expiration(manifest_keys[0], Expiration::from_millis(77))
            .await
            .unwrap();
        cell.destroy().await;
        connection.close();
        (segment_keys, manifest_keys[0])
    };

    let connection = open_database(&provider, &config).unwrap();
    let cell = StorageCell::new(Arc::clone(&connection), config.cell_config());
    assert_eq!(cell.get_segments(&segment_keys).await.unwrap(), segments);
    let manifests = cell.get_all_manifests().await.unwrap();
    assert_eq!(manifests.len(), 1);
    assert_eq!(manifests[&manifest_key].expiration, Expiration::from_millis(77));

    let next = cell.add_segments(&[create_segment_data(&[5])]).await.unwrap();
    assert!(segment_keys.iter().all(|key| *key != next[0]));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn added_records_read_back_in_key_order(
        segments in prop::collection::vec(segment_strategy(), 0..8),
        manifests in prop::collection::vec(manifest_strategy(), 0..4),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let storage = TestStorage::memory();
            let cell = storage.cell();

            let segment_keys = cell.add_segments(&segments).await.unwrap();
            prop_assert_eq!(cell.get_segments(&segment_keys).await.unwrap(), segments.clone());

            let manifest_keys = cell.add_manifests(&manifests).await.unwrap();
            prop_assert_eq!(cell.get_manifests(&manifest_keys).await.unwrap(), manifests.clone());

            let all = cell.get_all_manifests().await.unwrap();
            prop_assert_eq!(all.len(), manifests.len());
            for (key, manifest) in manifest_keys.iter().zip(&manifests) {
                prop_assert_eq!(all.get(key), Some(manifest));
            }
            Ok(())
        })?;
    }
}
