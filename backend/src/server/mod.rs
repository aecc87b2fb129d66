//! Server construction and middleware wiring.

mod config;

pub use config::{FeedbackServiceSettings, SettingsError, UpstreamUrls};

use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use mockable::{Clock, DefaultClock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use feedback_service::Trace;
#[cfg(debug_assertions)]
use feedback_service::doc::ApiDoc;
use feedback_service::domain::{
    ConsistencyWorker, ConsistencyWorkerConfig, FeedbackService, RemoteCheckSettings,
    RemoteFactCheckers, UpstreamDirectories, ValidationPipeline,
};
use feedback_service::inbound::http::feedback;
use feedback_service::inbound::http::health::{HealthState, live, ready};
use feedback_service::inbound::http::state::{HttpState, HttpStatePorts};
use feedback_service::outbound::persistence::{
    DbPool, DieselFeedbackRepository, DieselUserDeletionInbox, InboxConfig,
};
use feedback_service::outbound::upstream::{
    HttpEnrollmentDirectory, HttpIdentityDirectory, HttpTrainingDirectory, HttpUserDirectory,
    UpstreamHttpClient,
};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

/// Everything the wiring needs beyond the database pool.
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub upstreams: UpstreamUrls,
    pub remote_checks: RemoteCheckSettings,
    pub inbox: InboxConfig,
    pub worker_enabled: bool,
}

impl ServerConfig {
    /// Resolve validated settings into a server configuration.
    ///
    /// # Errors
    /// Returns [`SettingsError`] when an address or URL fails to parse.
    pub fn from_settings(settings: &FeedbackServiceSettings) -> Result<Self, SettingsError> {
        Ok(Self {
            bind_addr: settings.bind_addr()?,
            upstreams: settings.upstream_urls()?,
            remote_checks: settings.remote_check_settings(),
            inbox: settings.inbox_config(),
            worker_enabled: settings.worker_enabled(),
        })
    }
}

/// Adapters and services shared between the HTTP server and the worker.
pub struct Components {
    pub http_state: web::Data<HttpState>,
    pub worker: Option<ConsistencyWorker>,
}

fn build_directories(
    urls: &UpstreamUrls,
    settings: RemoteCheckSettings,
) -> Result<UpstreamDirectories, reqwest::Error> {
    let client = |base: &url::Url| UpstreamHttpClient::new(base.clone(), settings.timeout);
    Ok(UpstreamDirectories {
        users: Arc::new(HttpUserDirectory::new(client(&urls.users)?)),
        trainings: Arc::new(HttpTrainingDirectory::new(client(&urls.trainings)?)),
        enrollments: Arc::new(HttpEnrollmentDirectory::new(client(&urls.enrollments)?)),
        identities: Arc::new(HttpIdentityDirectory::new(client(&urls.identities)?)),
    })
}

/// Wire the domain services over PostgreSQL and the upstream HTTP clients.
///
/// # Errors
/// Returns [`std::io::Error`] when an upstream HTTP client cannot be built.
pub fn build_components(config: &ServerConfig, pool: DbPool) -> std::io::Result<Components> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let directories = build_directories(&config.upstreams, config.remote_checks)
        .map_err(|e| std::io::Error::other(format!("upstream client setup failed: {e}")))?;
    let checkers = Arc::new(RemoteFactCheckers::new(
        directories,
        config.remote_checks,
        Arc::clone(&clock),
    ));

    let repository = Arc::new(DieselFeedbackRepository::new(pool.clone()));
    let service = Arc::new(FeedbackService::new(
        Arc::clone(&repository),
        ValidationPipeline::new(Arc::clone(&checkers)),
    ));
    let inbox = Arc::new(DieselUserDeletionInbox::new(pool, clock, config.inbox));

    let worker = config.worker_enabled.then(|| {
        ConsistencyWorker::new(
            repository,
            inbox.clone(),
            ConsistencyWorkerConfig::default(),
        )
    });

    let http_state = web::Data::new(HttpState::new(HttpStatePorts {
        feedback: service.clone(),
        feedback_query: service,
        user_deletions: inbox,
        dependencies: checkers,
    }));

    Ok(Components { http_state, worker })
}

/// Handle to a running consistency worker.
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the worker to stop and wait for the in-flight delivery.
    pub async fn stop(self) {
        if self.shutdown.send(true).is_err() {
            info!("consistency worker already stopped");
        }
        if let Err(error) = self.task.await {
            tracing::error!(%error, "consistency worker task failed");
        }
    }
}

/// Run the worker on the Tokio runtime until [`WorkerHandle::stop`].
pub fn spawn_worker(worker: ConsistencyWorker) -> WorkerHandle {
    let (shutdown, receiver) = watch::channel(false);
    let task = tokio::spawn(async move { worker.run(receiver).await });
    WorkerHandle { shutdown, task }
}

fn build_app(
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .wrap(Trace)
        .configure(feedback::configure)
        .service(ready)
        .service(live);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    app
}

/// Construct an Actix HTTP server using the provided health state and components.
///
/// # Returns
/// A spawned [`Server`] that must be awaited to drive the listener.
///
/// # Errors
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let server_health_state = health_state.clone();
    let bind_addr = config.bind_addr;
    #[cfg(feature = "metrics")]
    let prometheus = make_metrics()?;

    let server = HttpServer::new(move || {
        let app = build_app(server_health_state.clone(), http_state.clone());

        #[cfg(feature = "metrics")]
        let app = app.wrap(prometheus.clone());

        app
    })
    .bind(bind_addr)?
    .run();

    info!(%bind_addr, "feedback service listening");
    health_state.mark_ready();
    Ok(server)
}

#[cfg(feature = "metrics")]
fn make_metrics() -> std::io::Result<actix_web_prom::PrometheusMetrics> {
    actix_web_prom::PrometheusMetricsBuilder::new("feedback")
        .endpoint("/metrics")
        .build()
        .map_err(|e| std::io::Error::other(format!("configure Prometheus metrics: {e}")))
}
