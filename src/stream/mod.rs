//! StreamDispatcher — four logical event streams with independent,
//! synchronous, per-stream-ordered subscriber APIs.
//!
//! Four independently-typed in-process streams, with no wire parsing of
//! their own — parsing an `AgentBackend`'s wire format is that backend's
//! concern, upstream of this dispatcher.

mod events;

pub use events::{MessageEvent, NodeEvent, NodeLifecycle, TaskEvent, TaskLifecycle, ToolEvent, ToolLifecycle};

use chrono::{DateTime, Utc};

/// A single-stream, synchronous, ordered publish/subscribe channel.
/// Dispatch never blocks on subscriber work beyond the callback itself —
/// subscribers that need async processing must maintain their own queues.
pub struct EventStream<T> {
    subscribers: Vec<Box<dyn Fn(&T) + Send>>,
}

impl<T> Default for EventStream<T> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }
}

impl<T> EventStream<T> {
    pub fn subscribe(&mut self, callback: impl Fn(&T) + Send + 'static) {
        self.subscribers.push(Box::new(callback));
    }

    pub fn emit(&self, event: &T) {
        for subscriber in &self.subscribers {
            subscriber(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// The four independently-subscribable streams. Across streams there is
/// no ordering guarantee; within a stream, delivery order
/// matches emission order (enforced by `EventStream::emit`'s sequential
/// iteration).
#[derive(Default)]
pub struct StreamDispatcher {
    pub messages: EventStream<MessageEvent>,
    pub task: EventStream<TaskEvent>,
    pub node: EventStream<NodeEvent>,
    pub tool: EventStream<ToolEvent>,
}

impl StreamDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit_message(&self, node_name: Option<String>, text: impl Into<String>, timestamp: DateTime<Utc>) {
        self.messages.emit(&MessageEvent {
            node_name,
            text: text.into(),
            timestamp,
        });
    }

    pub fn emit_task(&self, lifecycle: TaskLifecycle, timestamp: DateTime<Utc>) {
        self.task.emit(&TaskEvent { lifecycle, timestamp });
    }

    pub fn emit_node(&self, node_name: String, lifecycle: NodeLifecycle, timestamp: DateTime<Utc>) {
        self.node.emit(&NodeEvent {
            node_name,
            lifecycle,
            timestamp,
        });
    }

    pub fn emit_tool(&self, tool_name: String, lifecycle: ToolLifecycle, timestamp: DateTime<Utc>) {
        self.tool.emit(&ToolEvent {
            tool_name,
            lifecycle,
            timestamp,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn subscribers_receive_events_in_emission_order() {
        let mut stream: EventStream<u32> = EventStream::default();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        stream.subscribe(move |n| seen_clone.lock().unwrap().push(*n));

        stream.emit(&1);
        stream.emit(&2);
        stream.emit(&3);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn multiple_subscribers_all_receive_every_event() {
        let mut stream: EventStream<u32> = EventStream::default();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = count.clone();
            stream.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        stream.emit(&42);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn streams_are_independent() {
        let dispatcher = StreamDispatcher::new();
        assert_eq!(dispatcher.messages.subscriber_count(), 0);
        assert_eq!(dispatcher.node.subscriber_count(), 0);
    }

    #[test]
    fn dispatcher_emits_typed_events_per_stream() {
        let mut dispatcher = StreamDispatcher::new();
        let seen = Arc::new(std::sync::Mutex::new(None));
        let seen_clone = seen.clone();
        dispatcher.node.subscribe(move |e: &NodeEvent| {
            *seen_clone.lock().unwrap() = Some(e.node_name.clone());
        });
        dispatcher.emit_node("scope_agent".into(), NodeLifecycle::Start, Utc::now());
        assert_eq!(seen.lock().unwrap().as_deref(), Some("scope_agent"));
    }
}
