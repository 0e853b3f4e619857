use nurture_scheduler::ResumeScheduler;
use nurture_server::{
    AppState, ServerConfig,
    db::{PgDeferredQueue, PgExecutionLedger, PgWorkflowStore},
    router,
    services::build_services,
};
use nurture_workflow::{Interpreter, InterpreterConfig, TriggerDispatcher};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!(long_wait = ?config.engine.long_wait, "Loaded configuration");

    let db_pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    let store = Arc::new(PgWorkflowStore::new(db_pool.clone()));
    let ledger = Arc::new(PgExecutionLedger::new(db_pool.clone()));
    let queue = Arc::new(PgDeferredQueue::new(db_pool));

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.engine.step_timeout_secs))
        .build()
        .expect("failed to build HTTP client");
    let services = build_services(&config, client);

    let interpreter = Arc::new(
        Interpreter::new(
            services,
            ledger.clone(),
            InterpreterConfig::from(&config.engine),
        )
        .with_deferred_queue(queue.clone()),
    );
    let dispatcher = Arc::new(TriggerDispatcher::new(store.clone(), interpreter.clone()));

    // Resume loop for suspended runs
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let scheduler = ResumeScheduler::new(
        queue,
        store.clone(),
        interpreter,
        Duration::from_secs(config.scheduler.poll_interval_secs),
    );
    let scheduler_task = tokio::spawn(async move {
        scheduler
            .run_until(async move {
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
            })
            .await;
    });

    let app = router(AppState::new(dispatcher, ledger, store));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await
        .expect("server error");

    tracing::info!("shutting down");
    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_task.await {
        tracing::warn!(error = %e, "resume scheduler task failed");
    }
}
