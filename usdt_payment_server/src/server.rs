use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use tokio_util::sync::CancellationToken;
use usdt_payment_engine::{
    OrderIssuerApi,
    PaymentStore,
    PlanCatalog,
    Reconciler,
    SqliteDatabase,
    TronGridClient,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    membership::{utc_offset, MembershipLedger},
    middleware::BearerAuthFactory,
    reconciliation_worker::start_reconciliation_worker,
    routes::{health, plans, AttachMessageRoute, CancelOrderRoute, CreateOrderRoute, OrderByIdRoute},
    telegram::TelegramNotifier,
};

/// Starts the reconciliation worker and the order API, and runs until the HTTP server stops (e.g. on Ctrl-C).
/// The worker is then told to stop and allowed to finish its current tick.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    if config.wallet_address.trim().is_empty() {
        return Err(ServerError::ConfigurationError(
            "UPG_WALLET_ADDRESS must be set to the address that receives payments".to_string(),
        ));
    }
    let mut db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🚀️ Payment database ready at {}", db.url());
    let ledger = TronGridClient::new(config.trongrid_config()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let offset = utc_offset(config.membership_utc_offset_hours).ok_or_else(|| {
        ServerError::ConfigurationError(format!("{} is not a valid UTC offset", config.membership_utc_offset_hours))
    })?;
    let memberships = MembershipLedger::connect_with_offset(&config.membership_database_url, offset)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let notifier = TelegramNotifier::new(&config.telegram);
    let reconciler =
        Reconciler::new(db.clone(), ledger, memberships.clone(), notifier, PlanCatalog::default(), config.reconcile_config());

    let shutdown = CancellationToken::new();
    let worker = start_reconciliation_worker(reconciler, config.poll_interval, shutdown.clone());
    info!("🚀️ Listening for order requests on {}:{}", config.host, config.port);
    let srv = create_server_instance(config, db.clone())?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));

    info!("🚀️ Server stopped. Waiting for the reconciliation worker to finish");
    shutdown.cancel();
    if let Err(e) = worker.await {
        error!("🚀️ The reconciliation worker did not shut down cleanly. {e}");
    }
    memberships.close().await;
    if let Err(e) = db.close().await {
        warn!("🚀️ Could not close the payment database. {e}");
    }
    result
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let issuer = web::Data::new(OrderIssuerApi::new(db, PlanCatalog::default(), config.issuer_config()));
    let catalog = web::Data::new(PlanCatalog::default());
    let api_token = config.api_token.clone();
    let srv = HttpServer::new(move || {
        let orders_scope = web::scope("")
            .wrap(BearerAuthFactory::new(api_token.clone()))
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(AttachMessageRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("upg::access_log"))
            .app_data(issuer.clone())
            .app_data(catalog.clone())
            .service(health)
            .service(plans)
            .service(orders_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
