//! Event notification
//!
//! Typed lifecycle and protocol events, and the sink that renders them and
//! forwards them to attached observers (operator console, logs, UIs).

pub mod event;
pub mod sink;

pub use event::{ChatEvent, LoginRejection};
pub use sink::{
    ChannelObserver, EventSink, LogObserver, Notification, Observer, ObserverError, ObserverId,
};
