use std::sync::Arc;
use std::time::Duration;

use eduadmin_api::UserInfo;
use eduadmin_local_store::{
    FileStorage, StorageBackend, TABLE_SETTINGS_KEY, TableSettingsStore, USER_STORE_KEY,
    UserStore,
};

fn file_backend(dir: &tempfile::TempDir) -> Arc<dyn StorageBackend> {
    Arc::new(FileStorage::new(dir.path()))
}

#[tokio::test]
async fn column_toggle_survives_reopen_without_touching_other_tables() {
    let dir = tempfile::tempdir().expect("tempdir");

    let settings = TableSettingsStore::new(file_backend(&dir));
    settings.store().hydrate().await.expect("hydrate empty");
    settings.toggle_column_visibility("courses", "cover", false);
    settings.toggle_column_visibility("students", "name", false);
    settings.store().flush().await.expect("flush");

    let reopened = TableSettingsStore::new(file_backend(&dir));
    reopened.store().hydrate().await.expect("hydrate");

    let students = reopened.column_visibility("students");
    assert_eq!(students.get("name"), Some(&false));
    assert_eq!(students.len(), 1);
    assert_eq!(reopened.column_visibility("courses").get("cover"), Some(&false));
    assert!(dir.path().join(format!("{TABLE_SETTINGS_KEY}.json")).exists());
}

#[tokio::test]
async fn credential_is_restored_before_waiters_resume() {
    let dir = tempfile::tempdir().expect("tempdir");

    let first = UserStore::new(file_backend(&dir));
    first.store().hydrate().await.expect("hydrate empty");
    first.login(
        "persisted-token",
        Some(UserInfo {
            id: "u1".to_string(),
            name: "Registrar".to_string(),
            ..UserInfo::default()
        }),
    );
    first.store().flush().await.expect("flush");
    assert!(dir.path().join(format!("{USER_STORE_KEY}.json")).exists());

    let second = UserStore::new(file_backend(&dir));
    let waiter = {
        let store = second.clone();
        tokio::spawn(async move {
            store.store().wait_for_hydration().await;
            store.token()
        })
    };
    second.store().hydrate().await.expect("hydrate");

    let token = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter resolves")
        .expect("waiter task");
    assert_eq!(token, "persisted-token");
    assert_eq!(second.user_info().map(|u| u.name), Some("Registrar".to_string()));
}

#[tokio::test]
async fn write_through_happens_without_explicit_flush() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = UserStore::new(file_backend(&dir));
    store.set_token("eventually-written");

    let path = dir.path().join(format!("{USER_STORE_KEY}.json"));
    let mut written = false;
    for _ in 0..100 {
        if let Ok(raw) = std::fs::read_to_string(&path) {
            if raw.contains("eventually-written") {
                written = true;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(written, "fire-and-forget write should land");
}
