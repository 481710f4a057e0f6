//! Central shared state — passed as `Arc<AppState>` to every Axum handler.
//! Grounded in `skynet_gateway::app::AppState`: one struct assembling every
//! subsystem, built once at startup and shared read-only (bar its own
//! internal locks) for the life of the process.

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use bridge_agents::AgentStore;
use bridge_chatnet::memory::InMemoryChatNetwork;
use bridge_chatnet::ChatNetwork;
use bridge_core::config::BridgeConfig;
use bridge_core::types::{LoginId, Provider};
use bridge_linkpreview::{HttpLinkFetcher, LinkFetcher};
use bridge_portals::factory::ChatFactory;
use bridge_portals::PortalStore;
use bridge_providers::codex::CodexProvider;
use bridge_providers::openai::OpenAiProvider;
use bridge_providers::ProviderRouter;
use bridge_scheduler::{SchedulerEngine, SchedulerHandle, SqliteSchedulerHandle};
use bridge_tools::ToolRegistry;
use bridge_turn::TurnEngine;
use rusqlite::Connection;
use tokio::sync::{mpsc, watch};
use tracing::info;

pub struct AppState {
    pub config: BridgeConfig,
    pub login_id: LoginId,
    pub login_provider: Provider,
    pub store: Arc<PortalStore>,
    pub agents: Arc<AgentStore>,
    pub network: Arc<dyn ChatNetwork>,
    pub router: Arc<ProviderRouter>,
    pub tools: Arc<ToolRegistry>,
    pub link_fetcher: Arc<dyn LinkFetcher>,
    pub scheduler: Arc<dyn SchedulerHandle>,
    pub factory: Arc<ChatFactory>,
    pub turn_engine: Arc<TurnEngine>,
    /// Jobs the scheduler's tick loop fires, drained by `bridge_turn::dispatch::run`.
    pub fired_jobs_tx: mpsc::Sender<bridge_scheduler::Job>,
    /// Flip to `true` to stop the scheduler's tick loop.
    pub scheduler_shutdown: watch::Sender<bool>,
}

fn parse_provider(name: &str) -> Provider {
    match name {
        "openrouter" => Provider::Openrouter,
        "beeper" => Provider::Beeper,
        "magic_proxy" => Provider::MagicProxy,
        "codex" => Provider::Codex,
        "custom" => Provider::Custom,
        _ => Provider::Openai,
    }
}

pub fn router_name_for(provider: Provider) -> &'static str {
    match provider {
        Provider::Openai => "openai",
        Provider::Openrouter => "openrouter",
        Provider::Beeper => "beeper",
        Provider::MagicProxy => "magic_proxy",
        Provider::Custom => "custom",
        Provider::Codex => "codex",
    }
}

/// Register every provider the operator configured credentials for. A
/// provider with no config section is simply absent from the router — the
/// first turn that routes to it fails with "no provider registered", which
/// is the signal an operator is missing a config section, not a silent no-op.
fn register_providers(router: &mut ProviderRouter, config: &bridge_core::config::ProvidersConfig) {
    if let Some(c) = &config.openai {
        router.register(Arc::new(OpenAiProvider::new("openai", c.base_url.clone(), c.api_key.clone())));
    }
    if let Some(c) = &config.openrouter {
        router.register(Arc::new(OpenAiProvider::new("openrouter", c.base_url.clone(), c.api_key.clone())));
    }
    if let Some(c) = &config.beeper {
        router.register(Arc::new(
            OpenAiProvider::new("beeper", c.base_url.clone(), c.api_key.clone()).as_aggregator(),
        ));
    }
    if let Some(c) = &config.magic_proxy {
        router.register(Arc::new(OpenAiProvider::new("magic_proxy", c.base_url.clone(), c.api_key.clone())));
    }
    if let Some(c) = &config.codex {
        router.register(Arc::new(CodexProvider::new(c.command.clone())));
    }
}

impl AppState {
    pub fn new(config: BridgeConfig) -> anyhow::Result<Self> {
        let db_path = &config.database.path;
        let store = Arc::new(PortalStore::new(Connection::open(db_path)?)?);
        let agents = Arc::new(AgentStore::new(Connection::open(db_path)?, config.login.id.clone()));
        let scheduler_handle: Arc<dyn SchedulerHandle> =
            Arc::new(SqliteSchedulerHandle::new(Connection::open(db_path)?)?);

        let network: Arc<dyn ChatNetwork> = Arc::new(InMemoryChatNetwork::new());

        let mut router = ProviderRouter::new();
        register_providers(&mut router, &config.providers);
        let router = Arc::new(router);

        let tools = Arc::new(ToolRegistry::with_built_ins());
        let link_fetcher: Arc<dyn LinkFetcher> = Arc::new(HttpLinkFetcher::new());

        let login_id = LoginId::from(config.login.id.as_str());
        let login_provider = parse_provider(&config.login.provider);

        let factory = Arc::new(ChatFactory::new(store.clone(), network.clone(), login_id.clone()));

        let (fired_jobs_tx, fired_jobs_rx) = mpsc::channel(64);
        let (scheduler_shutdown, shutdown_rx) = watch::channel(false);
        let scheduler_engine = SchedulerEngine::new(Connection::open(db_path)?, Some(fired_jobs_tx.clone()))?;
        tokio::spawn(scheduler_engine.run(shutdown_rx));

        let turn_engine = Arc::new(TurnEngine {
            store: store.clone(),
            network: network.clone(),
            router: router.clone(),
            tool_registry: tools.clone(),
            link_fetcher: link_fetcher.clone(),
            scheduler: scheduler_handle.clone(),
            turn_config: config.turn.clone(),
            compaction_config: config.compaction.clone(),
        });

        match router.get(router_name_for(login_provider)) {
            Some(provider) => {
                tokio::spawn(bridge_turn::dispatch::run(
                    fired_jobs_rx,
                    store.clone(),
                    network.clone(),
                    provider,
                    config.turn.title_generation_model.clone(),
                    login_id.clone(),
                ));
            }
            None => {
                info!(
                    provider = router_name_for(login_provider),
                    "no provider configured for the bootstrap login; title generation and reminders will not fire"
                );
                drop(fired_jobs_rx);
            }
        }

        Ok(Self {
            config,
            login_id,
            login_provider,
            store,
            agents,
            network,
            router,
            tools,
            link_fetcher,
            scheduler: scheduler_handle,
            factory,
            turn_engine,
            fired_jobs_tx,
            scheduler_shutdown,
        })
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/webhooks/{source}", post(crate::http::webhooks::webhook_handler))
        .route("/portals/{portal_id}/settings", put(crate::http::settings::settings_handler))
        .route(
            "/portals/{portal_id}/messages/{message_id}",
            delete(crate::http::redactions::redaction_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_provider_round_trips_through_router_name_for() {
        for p in [
            Provider::Openai,
            Provider::Openrouter,
            Provider::Beeper,
            Provider::MagicProxy,
            Provider::Codex,
            Provider::Custom,
        ] {
            assert_eq!(parse_provider(router_name_for(p)), p);
        }
    }

    #[test]
    fn parse_provider_defaults_unknown_names_to_openai() {
        assert_eq!(parse_provider("something-unconfigured"), Provider::Openai);
    }
}
