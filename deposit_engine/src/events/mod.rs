//! Order event fan-out
//!
//! Order snapshots come in through [`EventProducer`]s, are funnelled through a single [`EventDispatcher`] task and
//! are copied into every live [`Subscriber`]'s queue by the [`EventBroadcaster`]. A subscriber whose queue is full is
//! evicted on the spot, so one slow viewer can never hold up the producers or the other viewers.
mod broadcaster;
mod channel;
mod event_types;

pub use broadcaster::{BroadcastFrame, EventBroadcaster, FanOutReport, Subscriber, SubscriberId};
pub use channel::{EventDispatcher, EventProducer};
pub use event_types::*;
