use std::sync::Arc;

/// A queued message as delivered by the in-process [`MemoryQueue`](crate::MemoryQueue).
///
/// The coordinator itself is generic over the message type; this struct is the
/// envelope used by the bundled source and by the demos.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Position of the message in its queue; also its identity for failure tracking.
    pub sequence: u64,
    /// Message type name, used by dispatchers to route.
    pub message_type: Arc<str>,
    /// Service the message was addressed to.
    pub service: Arc<str>,
    /// Opaque payload.
    pub body: Vec<u8>,
}

impl Message {
    /// Creates a message with an unassigned sequence (the queue assigns it on push).
    pub fn new(message_type: impl Into<Arc<str>>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            sequence: 0,
            message_type: message_type.into(),
            service: Arc::from(""),
            body: body.into(),
        }
    }

    pub fn with_service(mut self, service: impl Into<Arc<str>>) -> Self {
        self.service = service.into();
        self
    }

    /// Payload as UTF-8, if it is valid.
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}
