//! Native shell: resolves the core's effects with real I/O.
//!
//! Effects are handled depth-first: whatever a resolution leads to runs before
//! the remaining siblings. Renders publish as soon as they arrive. A
//! permission request waits on the user, so it runs on its own task and the
//! event chain that asked for it carries on without it.

mod http;
mod kv;
mod notify;

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

pub use self::http::{HttpTransport, ReqwestTransport, RetryingTransport};
pub use self::kv::{KeyValueStore, MemoryStore, SqliteStore};
pub use self::notify::{LogNotifier, NotificationSink};

use crate::capabilities::{KeyValueError, NotifyOperation};
use crate::config::{ClientConfig, ConfigError};
use crate::{Core, Effect, Event, ViewModel};

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("failed to open storage: {0}")]
    Storage(#[from] KeyValueError),
}

struct Inner {
    core: Core,
    http: Arc<dyn HttpTransport>,
    store: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn NotificationSink>,
    views: watch::Sender<ViewModel>,
}

type Chain = Pin<Box<dyn Future<Output = ()> + Send>>;

impl Inner {
    fn run(self: Arc<Self>, effects: Vec<Effect>) -> Chain {
        Box::pin(async move {
            let mut pending: VecDeque<Effect> = effects.into();
            while let Some(effect) = pending.pop_front() {
                let follow_up = match effect {
                    Effect::Render(_) => {
                        self.views.send_replace(self.core.view());
                        continue;
                    }
                    Effect::Http(mut request) => {
                        let output = self.http.execute(&request.operation).await;
                        self.core.resolve(&mut request, output)
                    }
                    Effect::KeyValue(mut request) => {
                        let output = kv::execute(self.store.as_ref(), &request.operation).await;
                        self.core.resolve(&mut request, output)
                    }
                    Effect::Notify(mut request) => {
                        if matches!(request.operation, NotifyOperation::RequestPermission) {
                            let inner = Arc::clone(&self);
                            tokio::spawn(async move {
                                let output =
                                    notify::execute(inner.notifier.as_ref(), &request.operation)
                                        .await;
                                let effects = inner.core.resolve(&mut request, output);
                                inner.run(effects).await;
                            });
                            continue;
                        }
                        let output =
                            notify::execute(self.notifier.as_ref(), &request.operation).await;
                        self.core.resolve(&mut request, output)
                    }
                };
                for effect in follow_up.into_iter().rev() {
                    pending.push_front(effect);
                }
            }
        })
    }
}

#[derive(Clone)]
pub struct Shell {
    inner: Arc<Inner>,
}

impl Shell {
    /// Production wiring: reqwest with GET retries, SQLite at the configured
    /// path, notifications to the log.
    pub async fn from_config(config: &ClientConfig) -> Result<Self, ShellError> {
        config.validate()?;
        let transport = Arc::new(ReqwestTransport::new(config)?);
        let http = Arc::new(RetryingTransport::new(transport, config.retry.clone()));
        let store = Arc::new(SqliteStore::open(&config.database_path)?);
        info!(
            backend = %config.backend_base_url,
            database = %config.database_path.display(),
            "shell configured"
        );

        let shell = Self::new(http, store, Arc::new(LogNotifier::new()));
        shell
            .dispatch(Event::BackendConfigured(config.backend_base_url.to_string()))
            .await;
        Ok(shell)
    }

    pub fn new(
        http: Arc<dyn HttpTransport>,
        store: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let core = Core::new();
        let (views, _) = watch::channel(core.view());
        Self {
            inner: Arc::new(Inner {
                core,
                http,
                store,
                notifier,
                views,
            }),
        }
    }

    /// Receive every rendered view, starting with the current one.
    pub fn subscribe(&self) -> watch::Receiver<ViewModel> {
        self.inner.views.subscribe()
    }

    #[must_use]
    pub fn view(&self) -> ViewModel {
        self.inner.core.view()
    }

    /// Apply `event` and resolve everything it leads to, except a pending
    /// permission request, which finishes on its own.
    pub async fn dispatch(&self, event: Event) {
        debug!(event = event.name(), "dispatch");
        let effects = self.inner.core.process_event(event);
        Arc::clone(&self.inner).run(effects).await;
    }
}
