//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Payment sessions and order streams are long-lived, so they never
//! run inside a handler: sessions are spawned as tasks, and streams are returned as response bodies that actix polls.
use std::sync::Arc;

use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use deposit_engine::{
    events::{EventBroadcaster, EventProducer, OrderEvent},
    BalanceSource,
    PaymentVerificationApi,
};
use log::*;

use crate::{
    config::ServerConfig,
    data_objects::{DepositBalance, JsonResponse},
    errors::ServerError,
    order_stream::order_event_stream,
    payment_channel::run_payment_channel,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Deposit  ----------------------------------------------------
route!(deposit_balance => Get "/deposit/balance" impl BalanceSource);
/// Route handler for the deposit balance endpoint
///
/// Returns the balance the deposit ledger last saw, when it saw it, and how many payments are being verified. The
/// brokerage is not queried; this is the cached value.
pub async fn deposit_balance<B: BalanceSource + 'static>(
    api: web::Data<PaymentVerificationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET deposit balance");
    let snapshot = api.ledger_snapshot().await;
    Ok(HttpResponse::Ok().json(DepositBalance::new(snapshot, api.active_sessions())))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(payment_channel => Get "/ws/payment" impl BalanceSource);
/// Route handler for the payment channel
///
/// Upgrades the request to a WebSocket. See [`crate::payment_channel`] for the message flow.
pub async fn payment_channel<B: BalanceSource + 'static>(
    req: HttpRequest,
    body: web::Payload,
    api: web::Data<PaymentVerificationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (response, session, messages) = actix_ws::handle(&req, body).map_err(|e| {
        debug!("💻️ Could not upgrade the payment channel request. {e}");
        ServerError::WebSocketError(e.to_string())
    })?;
    let api = api.get_ref().clone();
    actix_web::rt::spawn(run_payment_channel(api, session, messages));
    Ok(response)
}

//----------------------------------------------   Orders  ----------------------------------------------------
#[get("/orders/stream")]
pub async fn order_stream(
    broadcaster: web::Data<EventBroadcaster>,
    config: web::Data<ServerConfig>,
) -> impl Responder {
    let broadcaster: Arc<EventBroadcaster> = broadcaster.into_inner();
    let subscriber = broadcaster.subscribe();
    info!("💻️ New order stream viewer. {} viewer(s) connected", broadcaster.subscriber_count());
    order_event_stream(subscriber, config.heartbeat_interval)
}

/// Order intake for the CRUD service that owns the orders. Events are queued for broadcast and acknowledged
/// straight away.
#[post("/orders/events")]
pub async fn order_events(
    body: web::Json<OrderEvent>,
    producer: web::Data<EventProducer>,
) -> Result<HttpResponse, ServerError> {
    let event = body.into_inner();
    debug!("💻️ Received {:?} event for order #{}", event.kind, event.order.id);
    producer.publish_event(event).await;
    Ok(HttpResponse::Accepted().json(JsonResponse::success("Event queued")))
}
