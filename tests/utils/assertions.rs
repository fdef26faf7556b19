//! Test assertion helpers - fluent API for verifying test expectations
#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::Value;

use partyroom::ConnectionId;

use super::setup::TestSetup;

// ============================================================================
// Assertion Helpers
// ============================================================================

pub struct MessageAssertion<'a> {
    setup: &'a TestSetup,
    connections: Vec<ConnectionId>,
}

impl<'a> MessageAssertion<'a> {
    pub fn for_connection(setup: &'a TestSetup, connection: ConnectionId) -> Self {
        Self {
            setup,
            connections: vec![connection],
        }
    }

    pub fn for_connections(setup: &'a TestSetup, connections: Vec<ConnectionId>) -> Self {
        Self { setup, connections }
    }

    /// Assert that every connection's next message has the given `tipo` (consumes it)
    pub async fn received(self, expected_tipo: &str) -> MessageContent {
        let mut payloads = Vec::new();

        for connection in &self.connections {
            let message = self
                .setup
                .mock_conn_manager
                .consume_message_for(*connection)
                .await;
            let message = message.unwrap_or_else(|| {
                panic!("{connection} should have received a {expected_tipo} message")
            });

            let value: Value = serde_json::from_str(&message).unwrap();
            assert_eq!(
                value["tipo"], expected_tipo,
                "{connection} received wrong message: {value}"
            );
            payloads.push(value);
        }

        MessageContent { payloads }
    }

    /// Assert that connections have nothing left to read
    pub async fn received_no_messages(self) {
        for connection in &self.connections {
            let leftover = self
                .setup
                .mock_conn_manager
                .consume_message_for(*connection)
                .await;
            assert!(
                leftover.is_none(),
                "{connection} should not have received any more messages, got {leftover:?}"
            );
        }
    }
}

pub struct MessageContent {
    pub payloads: Vec<Value>,
}

impl MessageContent {
    /// Payload received by the first connection
    pub fn payload(&self) -> &Value {
        &self.payloads[0]
    }
}
