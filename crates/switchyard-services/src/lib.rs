pub mod calendar;
pub mod http;
pub mod mail;
pub mod params;
pub mod storage;

pub use calendar::CalendarExecutor;
pub use http::ApiClient;
pub use mail::MailExecutor;
pub use storage::StorageExecutor;

use std::sync::Arc;
use std::time::Duration;

use switchyard_core::config::AppConfig;
use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::traits::ServiceExecutor;
use switchyard_core::types::{Service, UserId};
use switchyard_memory::HybridRetriever;

/// The three executors acting for one user with one access token.
///
/// Built fresh for every plan execution; nothing in it is shared across
/// users.
pub struct ServiceSet {
    pub mail: Arc<MailExecutor>,
    pub calendar: Arc<CalendarExecutor>,
    pub storage: Arc<StorageExecutor>,
}

impl ServiceSet {
    pub fn for_user(
        config: &AppConfig,
        user: UserId,
        access_token: &str,
        retriever: Arc<HybridRetriever>,
    ) -> Result<Self> {
        let services = &config.services;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(services.request_timeout_secs))
            .build()
            .map_err(|e| SwitchyardError::Config(format!("HTTP client: {}", e)))?;

        let api = |service: Service, base_url: &str| {
            ApiClient::new(
                client.clone(),
                service,
                base_url,
                access_token,
                services.retry.clone(),
            )
        };
        let limits = &config.retrieval;

        Ok(Self {
            mail: Arc::new(MailExecutor::new(
                user,
                api(Service::Mail, &services.mail_base_url),
                retriever.clone(),
                limits.default_limit,
            )),
            calendar: Arc::new(CalendarExecutor::new(
                user,
                api(Service::Calendar, &services.calendar_base_url),
                retriever.clone(),
                limits.event_limit,
            )),
            storage: Arc::new(StorageExecutor::new(
                user,
                api(Service::Storage, &services.storage_base_url),
                retriever,
                limits.default_limit,
            )),
        })
    }

    pub fn executors(&self) -> Vec<Arc<dyn ServiceExecutor>> {
        vec![
            self.mail.clone() as Arc<dyn ServiceExecutor>,
            self.calendar.clone(),
            self.storage.clone(),
        ]
    }
}
