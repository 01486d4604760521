//! Test configuration helpers for creating coordinators over temporary storage

use super::mocks::{FakeChat, FakeFetcher};
use chat_media_backup::{Config, IngestionCoordinator};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Config with millisecond retry delays and a fast monitor
pub fn fast_config(db_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.download.database_path = db_dir.path().join("downloads.db");
    config.retry.base_delay = Duration::from_millis(2);
    config.retry.delay_offset = Duration::from_millis(1);
    config.monitor.poll_interval = Duration::from_millis(5);
    config.monitor.update_interval = Duration::from_millis(10);
    config
}

/// Coordinator plus everything it needs to stay alive during a test
pub struct TestPipeline {
    pub coordinator: IngestionCoordinator,
    pub fetcher: Arc<FakeFetcher>,
    pub destination: TempDir,
    pub db_dir: TempDir,
}

/// Build a coordinator over `chat` and `fetcher` with a fresh database and destination
pub async fn pipeline(chat: FakeChat, fetcher: FakeFetcher) -> TestPipeline {
    let db_dir = TempDir::new().unwrap();
    let fetcher = Arc::new(fetcher);
    let coordinator =
        IngestionCoordinator::open(fast_config(&db_dir), Arc::new(chat), fetcher.clone())
            .await
            .unwrap();

    TestPipeline {
        coordinator,
        fetcher,
        destination: TempDir::new().unwrap(),
        db_dir,
    }
}
