use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use revalidator::{
    application::{
        error::AppError,
        indexing::{IndexerConfig, SearchIndexer},
        invalidation::RouteInvalidator,
        resolver::{ResolverConfig, RouteResolver},
        revalidation::RevalidationService,
        signature::SignatureVerifier,
        store::ContentStore,
    },
    config,
    domain::{
        documents::DocumentSummary,
        event::{ChangeEvent, EventParent},
    },
    infra::{
        content_store::HttpContentStore,
        error::InfraError,
        http::{self, WebhookState},
        invalidator::{HttpRouteInvalidator, LoggingInvalidator},
        search_index::HttpSearchIndex,
        telemetry,
    },
};
use revalidator_types::RevalidationSummary;
use tokio::{signal, sync::oneshot};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Resolve(args) => run_resolve(settings, args).await,
        config::Command::Reindex(_) => run_reindex(settings).await,
    }
}

struct ApplicationContext {
    store: Arc<dyn ContentStore>,
    routes: Arc<ResolverConfig>,
    resolver: Arc<RouteResolver>,
}

fn build_application_context(settings: &config::Settings) -> Result<ApplicationContext, AppError> {
    let store: Arc<dyn ContentStore> = Arc::new(HttpContentStore::new(&settings.content_store)?);
    let resolver_config = ResolverConfig::from(&settings.resolver);
    let routes = Arc::new(resolver_config.clone());
    let resolver = Arc::new(RouteResolver::new(store.clone(), resolver_config));
    Ok(ApplicationContext {
        store,
        routes,
        resolver,
    })
}

fn build_indexer(
    settings: &config::Settings,
    app: &ApplicationContext,
) -> Result<Option<Arc<SearchIndexer>>, AppError> {
    let Some(backend) = settings.search.backend.as_ref() else {
        return Ok(None);
    };
    let index = Arc::new(HttpSearchIndex::new(backend, settings.search.timeout)?);
    let indexer_config = IndexerConfig {
        indexable_types: settings.search.indexable_types.clone(),
        body_max_chars: settings.search.body_max_chars,
        batch_size: settings.search.batch_size,
    };
    Ok(Some(Arc::new(SearchIndexer::new(
        app.store.clone(),
        index,
        app.routes.clone(),
        indexer_config,
    ))))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let secret = settings
        .webhook
        .secret
        .as_deref()
        .ok_or_else(|| AppError::validation("webhook.secret is required to serve webhooks"))?;
    let verifier = SignatureVerifier::new(secret.as_bytes(), settings.webhook.tolerance)
        .map_err(|err| AppError::validation(err.to_string()))?;

    let app = build_application_context(&settings)?;
    let invalidator: Arc<dyn RouteInvalidator> = match settings.invalidation.endpoint.clone() {
        Some(endpoint) => Arc::new(HttpRouteInvalidator::new(endpoint, &settings.invalidation)?),
        None => {
            warn!(
                target = "revalidator::serve",
                "no invalidation endpoint configured; routes are only logged"
            );
            Arc::new(LoggingInvalidator)
        }
    };
    let indexer = build_indexer(&settings, &app)?;
    let revalidation = Arc::new(RevalidationService::new(
        app.resolver.clone(),
        invalidator,
        settings.invalidation.concurrency,
    ));

    let state = WebhookState {
        verifier: Arc::new(verifier),
        revalidation,
        indexer,
        reindex_secret: settings.search.reindex_secret.as_deref().map(Arc::from),
        signature_header: Arc::from(settings.webhook.signature_header.as_str()),
        operation_header: Arc::from(settings.webhook.operation_header.as_str()),
    };

    serve_http(&settings, state).await
}

async fn serve_http(settings: &config::Settings, state: WebhookState) -> Result<(), AppError> {
    let router = http::build_router(state, settings.server.max_body_bytes);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::bind(settings.server.addr))?;

    info!(
        target = "revalidator::serve",
        addr = %settings.server.addr,
        search_indexing = settings.search.enabled(),
        "listening for webhooks"
    );

    let (stopping_tx, stopping_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            shutdown_signal().await;
            let _ = stopping_tx.send(());
        },
    );

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = server.into_future() => {
            result.map_err(|err| AppError::from(InfraError::Serve(err)))
        }
        () = drain_deadline(stopping_rx, grace) => {
            warn!(
                target = "revalidator::serve",
                grace_seconds = grace.as_secs(),
                "in-flight requests did not finish before the shutdown deadline"
            );
            Ok(())
        }
    }
}

/// Resolves `grace` after shutdown starts; never resolves otherwise.
async fn drain_deadline(stopping: oneshot::Receiver<()>, grace: Duration) {
    if stopping.await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(grace).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(target = "revalidator::serve", error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(target = "revalidator::serve", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!(target = "revalidator::serve", "received Ctrl+C, shutting down"),
        () = terminate => info!(target = "revalidator::serve", "received SIGTERM, shutting down"),
    }
}

async fn run_resolve(settings: config::Settings, args: config::ResolveArgs) -> Result<(), AppError> {
    let app = build_application_context(&settings)?;

    let mut event = ChangeEvent::new(args.document_id, args.document_type, args.operation);
    if let Some(slug) = args.slug {
        event = event.with_slug(slug);
    }
    if let Some(parent) = args.parent {
        let parent = DocumentSummary::new(parent, event.document_type.clone());
        event = event.with_parent(EventParent::Document(parent));
    }

    let resolution = app
        .resolver
        .resolve(&event)
        .await
        .map_err(|err| AppError::unexpected(format!("resolution failed: {err}")))?;

    let summary = RevalidationSummary {
        document_id: event.document_id,
        document_type: event.document_type,
        routes: resolution.routes.into_strings(),
    };
    println!("{}", summary.to_plain_text());
    Ok(())
}

async fn run_reindex(settings: config::Settings) -> Result<(), AppError> {
    if !settings.search.enabled() {
        return Err(AppError::validation(
            "search.index_name is not configured; nothing to reindex",
        ));
    }
    let app = build_application_context(&settings)?;
    let indexer = build_indexer(&settings, &app)?
        .ok_or_else(|| AppError::validation("search.index_name is not configured"))?;

    let count = indexer
        .reindex_all()
        .await
        .map_err(|err| AppError::unexpected(format!("reindex failed: {err}")))?;
    info!(target = "revalidator::reindex", records = count, "search index rebuilt");
    println!("Indexed {count} record(s)");
    Ok(())
}
