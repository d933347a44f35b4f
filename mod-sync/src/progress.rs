//! Human-readable progress stream for scans
//!
//! Purely observational: nothing in the engine depends on what a sink does with events.

use serde::Serialize;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanEventLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanEvent {
    pub level: ScanEventLevel,
    pub message: String,
}

/// Receiver of scan progress lines. All methods have default no-op implementations.
pub trait ScanEventSink: Send + Sync {
    fn on_event(&self, _event: ScanEvent) {}
}

/// Write a progress line to the log and to `sink`
pub fn emit(sink: &dyn ScanEventSink, level: ScanEventLevel, message: String, context: &str) {
    match level {
        ScanEventLevel::Info => logger::log_info(&message, Some(context)),
        ScanEventLevel::Warning => logger::log_warn(&message, Some(context)),
        ScanEventLevel::Error => logger::log_error(&message, Some(context)),
    }
    sink.on_event(ScanEvent { level, message });
}

/// No-op sink for silent operation.
pub struct SilentSink;

impl ScanEventSink for SilentSink {}

/// Forwards events into an unbounded channel; a dropped receiver is ignored
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<ScanEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ScanEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ScanEventSink for ChannelSink {
    fn on_event(&self, event: ScanEvent) {
        let _ = self.sender.send(event);
    }
}

/// Keeps every event in memory
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<ScanEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ScanEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.message).collect()
    }
}

impl ScanEventSink for MemorySink {
    fn on_event(&self, event: ScanEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (sink, mut receiver) = ChannelSink::new();
        sink.on_event(ScanEvent {
            level: ScanEventLevel::Info,
            message: "[1/2] scanning a".to_string(),
        });
        sink.on_event(ScanEvent {
            level: ScanEventLevel::Warning,
            message: "[2/2] scanning b".to_string(),
        });

        assert_eq!(receiver.recv().await.unwrap().message, "[1/2] scanning a");
        let second = receiver.recv().await.unwrap();
        assert_eq!(second.level, ScanEventLevel::Warning);
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, receiver) = ChannelSink::new();
        drop(receiver);
        sink.on_event(ScanEvent {
            level: ScanEventLevel::Error,
            message: "lost".to_string(),
        });
    }

    #[test]
    fn test_emit_reaches_sink() {
        let sink = MemorySink::new();
        emit(&sink, ScanEventLevel::Warning, "tool missing".to_string(), "test");
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, ScanEventLevel::Warning);
    }

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        SilentSink.on_event(ScanEvent {
            level: ScanEventLevel::Info,
            message: "ignored".to_string(),
        });
        sink.on_event(ScanEvent {
            level: ScanEventLevel::Info,
            message: "kept".to_string(),
        });
        assert_eq!(sink.messages(), vec!["kept".to_string()]);
    }
}
