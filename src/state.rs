use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::clients::{Fetcher, HttpFetcher};
use crate::collect::{BlendPolicy, CollectContext, ImageSynchronizer, PseudoRewriter};
use crate::config::Config;
use crate::db::Store;
use crate::domain::events::CollectEvent;

/// Everything a command needs to run collections against the configured
/// database.
#[derive(Clone)]
pub struct SharedState {
    pub config: Config,

    pub store: Store,

    pub context: CollectContext,

    pub event_bus: broadcast::Sender<CollectEvent>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let (event_bus, _) = broadcast::channel(config.general.event_bus_buffer_size.max(1));

        let settings = &config.collect;
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(
            Duration::from_secs(settings.request_timeout_seconds),
            &settings.user_agent,
        )?);
        let image_fetcher: Arc<dyn Fetcher> = Arc::new(
            HttpFetcher::new(
                Duration::from_secs(settings.image_timeout_seconds),
                &settings.user_agent,
            )?
            .with_max_bytes(settings.max_image_bytes),
        );

        let images = ImageSynchronizer::new(
            image_fetcher,
            &config.general.images_path,
            &config.general.image_public_prefix,
            settings.resolve_target_hosts,
        );

        let pseudo = if config.pseudo.any_enabled() {
            PseudoRewriter::new(&config.pseudo)
        } else {
            PseudoRewriter::disabled()
        };

        let store_arc = Arc::new(store.clone());
        let context = CollectContext {
            records: store_arc.clone(),
            directory: store_arc.clone(),
            runs: store_arc,
            fetcher,
            images: Arc::new(images),
            pseudo: Arc::new(pseudo),
            settings: settings.clone(),
            blend: BlendPolicy::default(),
            events: event_bus.clone(),
            rng_seed: None,
        };

        Ok(Self {
            config,
            store,
            context,
            event_bus,
        })
    }
}
