use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use deposit_engine::{
    events::{EventBroadcaster, EventDispatcher, EventProducer},
    BalanceSource,
    DepositLedger,
    PaymentVerificationApi,
};
use kis_tools::KisApi;
use log::*;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::kis::KisBalanceSource,
    routes::{health, order_events, order_stream, DepositBalanceRoute, PaymentChannelRoute},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let kis_config = config.kis.clone().ok_or_else(|| {
        ServerError::ConfigurationError("The KIS brokerage account credentials have not been configured".into())
    })?;
    let kis = KisApi::new(kis_config)?;
    let token = kis.issue_access_token().await?;
    info!("🚀️ KIS access token issued. It expires at {}", token.expires_at);
    let source = KisBalanceSource::new(kis);
    let ledger = DepositLedger::initialize(source).await?;
    let api = PaymentVerificationApi::new(Arc::new(ledger), config.session_config());
    info!(
        "🚀️ Payments will be polled every {:?}, at most {} times",
        config.session_config().poll_interval,
        config.session_config().max_attempts
    );

    let broadcaster = Arc::new(EventBroadcaster::new(config.subscriber_queue_depth));
    let dispatcher = EventDispatcher::new(config.event_buffer_size, Arc::clone(&broadcaster));
    let producer = dispatcher.producer();
    tokio::spawn(dispatcher.start_dispatcher());

    let srv = create_server_instance(config, api, broadcaster, producer)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance<B>(
    config: ServerConfig,
    api: PaymentVerificationApi<B>,
    broadcaster: Arc<EventBroadcaster>,
    producer: EventProducer,
) -> Result<Server, ServerError>
where
    B: BalanceSource + 'static,
{
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("kiosk::access_log"))
            .app_data(web::Data::new(api.clone()))
            .app_data(web::Data::from(Arc::clone(&broadcaster)))
            .app_data(web::Data::new(producer.clone()))
            .app_data(web::Data::new(config.clone()));
        let api_scope = web::scope("/api")
            .service(DepositBalanceRoute::<B>::new())
            .service(PaymentChannelRoute::<B>::new())
            .service(order_stream)
            .service(order_events);
        app.service(health).service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
