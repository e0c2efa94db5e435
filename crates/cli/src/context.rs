use anyhow::{Context, Result};
use eduadmin_api_client::{ApiClient, ClientSettings, Navigator};
use eduadmin_local_store::{FileStorage, StorageBackend, TableSettingsStore, UserStore};
use eduadmin_runtime_config::AdminConfig;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config_cmd::load_config;

/// Stores and client shared by every console command.
pub struct AppContext {
    pub config: AdminConfig,
    pub user: UserStore,
    pub tables: TableSettingsStore,
    pub client: ApiClient,
}

/// A terminal has no sign-in page; point the user at `login` instead.
struct SignInHint;

impl Navigator for SignInHint {
    fn redirect(&self, path: &str) {
        info!("sign-in required ({path})");
        eprintln!("Session expired. Run `eduadmin login --token <token>` to sign in again.");
    }
}

impl AppContext {
    pub async fn open(config_path: &Path) -> Result<Self> {
        let config = load_config(config_path)?;
        let data_dir = config.data_dir().context("Could not determine data directory")?;
        let backend: Arc<dyn StorageBackend> = Arc::new(FileStorage::new(&data_dir));

        let user = UserStore::new(Arc::clone(&backend));
        let tables = TableSettingsStore::new(backend);
        info!("restoring stores from {}", data_dir.display());

        {
            let user = user.clone();
            let tables = tables.clone();
            tokio::spawn(async move {
                let (u, t) = tokio::join!(user.store().hydrate(), tables.store().hydrate());
                for e in [u.err(), t.err()].into_iter().flatten() {
                    warn!("store hydration failed: {e}");
                }
            });
        }
        // Nothing reads the credential before it is back in memory.
        tokio::join!(user.store().wait_for_hydration(), tables.store().wait_for_hydration());

        let client = ApiClient::new(ClientSettings::from_config(&config), user.clone())
            .context("Failed to build HTTP client")?
            .with_navigator(Arc::new(SignInHint));

        Ok(Self {
            config,
            user,
            tables,
            client,
        })
    }

    /// Wait for pending write-through jobs and the sign-in hint before the
    /// process exits.
    pub async fn close(&self) -> Result<()> {
        self.client.wait_for_redirect().await;
        self.user.store().flush().await.context("Failed to save session")?;
        self.tables
            .store()
            .flush()
            .await
            .context("Failed to save table settings")?;
        Ok(())
    }
}
