use std::{sync::Arc, time::Duration};

use actix_web::{http::StatusCode, test, web, App};
use chrono::Utc;
use deposit_engine::events::{EventBroadcaster, EventDispatcher, OrderEvent, OrderEventKind, OrderLine, OrderSnapshot};
use kiosk_common::Won;

use super::helpers::post_request;
use crate::{
    config::ServerConfig,
    routes::{order_events, order_stream},
};

fn sample_event() -> OrderEvent {
    let lines = vec![
        OrderLine { menu_id: 3, menu_name: "Americano".into(), quantity: 2, price: Won::from(3000) },
        OrderLine { menu_id: 9, menu_name: "Croissant".into(), quantity: 1, price: Won::from(3500) },
    ];
    OrderEvent::created(OrderSnapshot::from_lines(101, lines, Utc::now()))
}

#[actix_web::test]
async fn posted_events_reach_subscribers() {
    let _ = env_logger::try_init().ok();
    let broadcaster = Arc::new(EventBroadcaster::new(4));
    let mut subscriber = broadcaster.subscribe();
    let dispatcher = EventDispatcher::new(8, Arc::clone(&broadcaster));
    let producer = dispatcher.producer();
    tokio::spawn(dispatcher.start_dispatcher());

    let body = serde_json::to_string(&sample_event()).unwrap();
    let (status, reply) = post_request("/orders/events", &body, move |cfg| {
        cfg.app_data(web::Data::new(producer)).service(order_events);
    })
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(reply.contains(r#""success":true"#));

    let event = tokio::time::timeout(Duration::from_secs(5), subscriber.recv())
        .await
        .expect("Event was not delivered")
        .expect("Subscription ended");
    assert_eq!(event.kind, OrderEventKind::Created);
    assert_eq!(event.order.id, 101);
    assert_eq!(event.order.total_price, Won::from(9500));
}

#[actix_web::test]
async fn malformed_events_are_rejected() {
    let _ = env_logger::try_init().ok();
    let broadcaster = Arc::new(EventBroadcaster::default());
    let dispatcher = EventDispatcher::new(8, broadcaster);
    let producer = dispatcher.producer();
    let (status, _) = post_request("/orders/events", r#"{"kind":"deleted","id":1}"#, move |cfg| {
        cfg.app_data(web::Data::new(producer)).service(order_events);
    })
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn order_stream_sends_events_then_ends_on_eviction() {
    let _ = env_logger::try_init().ok();
    let broadcaster = Arc::new(EventBroadcaster::new(4));
    let app = App::new()
        .app_data(web::Data::from(Arc::clone(&broadcaster)))
        .app_data(web::Data::new(ServerConfig::default()))
        .service(order_stream);
    let service = test::init_service(app).await;
    let req = test::TestRequest::get().uri("/orders/stream").to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers().get("content-type").unwrap(), "text/event-stream");
    assert_eq!(broadcaster.subscriber_count(), 1);

    let report = broadcaster.fan_out(&sample_event());
    assert_eq!(report.delivered, 1);
    // The first subscriber of a fresh broadcaster has id 1. Removing it closes the stream once it has drained.
    assert!(broadcaster.unsubscribe(1));
    let body = test::read_body(res).await;
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.starts_with("data: {"), "{text}");
    assert!(text.contains(r#""id":101"#));
    assert!(text.ends_with("\n\n"));
    assert_eq!(text.matches("data: ").count(), 1);
}

#[actix_web::test]
async fn idle_order_streams_get_keepalives() {
    let _ = env_logger::try_init().ok();
    let broadcaster = Arc::new(EventBroadcaster::default());
    let config = ServerConfig { heartbeat_interval: Duration::from_millis(20), ..Default::default() };
    let app = App::new()
        .app_data(web::Data::from(Arc::clone(&broadcaster)))
        .app_data(web::Data::new(config))
        .service(order_stream);
    let service = test::init_service(app).await;
    let req = test::TestRequest::get().uri("/orders/stream").to_request();
    let res = test::call_service(&service, req).await;
    let closer = Arc::clone(&broadcaster);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        closer.unsubscribe(1);
    });
    let body = test::read_body(res).await;
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.starts_with(": keepalive\n\n"), "{text}");
    assert!(!text.contains("data:"));
}
