use redis::aio::ConnectionManager;
use std::sync::Arc;
use crate::config::Config;
use crate::error::Result;
use crate::providers::{
    gemini::{GeminiClient, TextGenerator},
    paypal::{PayPalClient, PaymentGateway},
};
use crate::repositories::{
    chat::{ChatRepository, PgChatRepository},
    session::{RedisSessionStore, SessionStore},
    user::{PgUserRepository, UserRepository},
};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// Credential store and quota ledger rows.
    pub users: Arc<dyn UserRepository>,
    /// Conversation log.
    pub chats: Arc<dyn ChatRepository>,
    /// Sessions, pending payments and rate-limit counters.
    pub sessions: Arc<dyn SessionStore>,
    /// The text-generation endpoint.
    pub generator: Arc<dyn TextGenerator>,
    /// The payment processor.
    pub payments: Arc<dyn PaymentGateway>,
    /// The application's configuration.
    pub config: Config,
}

impl AppState {
    /// Creates a new `AppState` backed by PostgreSQL, Redis and the real
    /// external providers.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = crate::db::create_pool(&config.database_url)?;
        crate::db::ensure_schema(&db).await?;
        tracing::info!("✅ PostgreSQL pool initialized and schema ensured");

        let redis_client = redis::Client::open(config.redis_url.as_str())?;
        let redis = ConnectionManager::new(redis_client).await?;
        tracing::info!("✅ Redis Connection Manager initialized (pooled)");

        let generator = GeminiClient::new(
            config.gemini_api_url.clone(),
            config.gemini_api_key.clone(),
        );
        let payments = PayPalClient::new(
            &config.paypal_mode,
            config.paypal_client_id.clone(),
            config.paypal_client_secret.clone(),
        );
        tracing::info!("✅ External providers configured (payments: {})", config.paypal_mode);

        Ok(AppState {
            users: Arc::new(PgUserRepository::new(db.clone())),
            chats: Arc::new(PgChatRepository::new(db)),
            sessions: Arc::new(RedisSessionStore::new(redis)),
            generator: Arc::new(generator),
            payments: Arc::new(payments),
            config: config.clone(),
        })
    }

    /// Assembles a state from explicit parts.
    pub fn from_parts(
        config: Config,
        users: Arc<dyn UserRepository>,
        chats: Arc<dyn ChatRepository>,
        sessions: Arc<dyn SessionStore>,
        generator: Arc<dyn TextGenerator>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            users,
            chats,
            sessions,
            generator,
            payments,
            config,
        }
    }
}
