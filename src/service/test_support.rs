//! Shared fixtures for service tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::HappinessService;
use crate::domain::{
    Bunny, BunnyEvent, BunnyId, BunnyProfileUpdate, EventBus, EventId, Happiness, NewBunny,
    NewBunnyEvent, PointsConfig,
};
use crate::error::HappinessError;
use crate::persistence::{
    BunnyStore, ConfigStore, EventStore, HappinessWrite, MemoryStore, Storage,
};

pub(crate) fn make_service() -> HappinessService {
    HappinessService::new(Storage::in_memory(), EventBus::new(64))
}

#[allow(clippy::panic)]
pub(crate) async fn add_bunny(service: &HappinessService, name: &str, happiness: u8) -> Bunny {
    let Ok(new) = NewBunny::parse(name, None, Some(Happiness::clamped(i64::from(happiness))))
    else {
        panic!("invalid test bunny");
    };
    let Ok(bunny) = service.add_bunny(new).await else {
        panic!("add_bunny failed");
    };
    bunny
}

/// Memory backend that fails selected operations on demand.
#[derive(Debug, Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    failing_writes: RwLock<HashSet<BunnyId>>,
    failing_histories: RwLock<HashSet<BunnyId>>,
}

impl FlakyStore {
    pub(crate) async fn fail_writes_for(&self, id: BunnyId) {
        self.failing_writes.write().await.insert(id);
    }

    pub(crate) async fn fail_history_for(&self, id: BunnyId) {
        self.failing_histories.write().await.insert(id);
    }

    async fn check_write(&self, id: BunnyId) -> Result<(), HappinessError> {
        if self.failing_writes.read().await.contains(&id) {
            return Err(HappinessError::Storage(format!("injected write failure for {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl BunnyStore for FlakyStore {
    async fn insert_bunny(&self, bunny: Bunny) -> Result<(), HappinessError> {
        self.inner.insert_bunny(bunny).await
    }

    async fn get_bunny(&self, id: BunnyId) -> Result<Option<Bunny>, HappinessError> {
        self.inner.get_bunny(id).await
    }

    async fn list_bunnies(&self) -> Result<Vec<Bunny>, HappinessError> {
        self.inner.list_bunnies().await
    }

    async fn update_profile(
        &self,
        id: BunnyId,
        update: &BunnyProfileUpdate,
    ) -> Result<Bunny, HappinessError> {
        self.inner.update_profile(id, update).await
    }

    async fn set_happiness(
        &self,
        id: BunnyId,
        value: Happiness,
    ) -> Result<HappinessWrite, HappinessError> {
        self.check_write(id).await?;
        self.inner.set_happiness(id, value).await
    }

    async fn adjust_happiness(
        &self,
        id: BunnyId,
        delta: i64,
    ) -> Result<HappinessWrite, HappinessError> {
        self.check_write(id).await?;
        self.inner.adjust_happiness(id, delta).await
    }
}

#[async_trait]
impl EventStore for FlakyStore {
    async fn append_event(&self, event: NewBunnyEvent) -> Result<BunnyEvent, HappinessError> {
        self.inner.append_event(event).await
    }

    async fn remove_event(&self, id: EventId) -> Result<(), HappinessError> {
        self.inner.remove_event(id).await
    }

    async fn list_events_for_bunny(
        &self,
        id: BunnyId,
    ) -> Result<Vec<BunnyEvent>, HappinessError> {
        if self.failing_histories.read().await.contains(&id) {
            return Err(HappinessError::Storage(format!(
                "injected history failure for {id}"
            )));
        }
        self.inner.list_events_for_bunny(id).await
    }

    async fn list_events(&self) -> Result<Vec<BunnyEvent>, HappinessError> {
        self.inner.list_events().await
    }

    async fn has_played_together(&self, a: BunnyId, b: BunnyId) -> Result<bool, HappinessError> {
        self.inner.has_played_together(a, b).await
    }
}

pub(crate) fn flaky_service() -> (HappinessService, Arc<FlakyStore>) {
    let flaky = Arc::new(FlakyStore::default());
    let storage = Storage::assemble(
        Arc::clone(&flaky) as Arc<dyn BunnyStore>,
        Arc::clone(&flaky) as Arc<dyn EventStore>,
        Arc::new(MemoryStore::new()),
    );
    (HappinessService::new(storage, EventBus::new(64)), flaky)
}

/// Points-table record that pauses after every read, widening the window
/// between reading a table and acting on it.
#[derive(Debug)]
pub(crate) struct SlowConfigStore {
    inner: MemoryStore,
    read_delay: Duration,
}

#[async_trait]
impl ConfigStore for SlowConfigStore {
    async fn load_config(&self) -> Result<Option<PointsConfig>, HappinessError> {
        let config = self.inner.load_config().await;
        tokio::time::sleep(self.read_delay).await;
        config
    }

    async fn save_config(&self, config: PointsConfig) -> Result<(), HappinessError> {
        self.inner.save_config(config).await
    }
}

pub(crate) fn slow_config_service(read_delay: Duration) -> HappinessService {
    let memory = Arc::new(MemoryStore::new());
    let storage = Storage::assemble(
        Arc::clone(&memory) as Arc<dyn BunnyStore>,
        memory as Arc<dyn EventStore>,
        Arc::new(SlowConfigStore {
            inner: MemoryStore::new(),
            read_delay,
        }),
    );
    HappinessService::new(storage, EventBus::new(64))
}

