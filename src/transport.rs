//! MQTT transport abstraction (component C8).
//!
//! The edge-node state machine is written against the [`Transport`]
//! trait, not directly against `rumqttc`, so the Sparkplug session
//! logic (seq/bdSeq bookkeeping, NCMD dispatch, RBE publishing) can be
//! exercised in tests with [`MockTransport`] and no live broker — the
//! MQTT client's network I/O runs on its own thread regardless of which
//! implementation is in use, posting events to a single-consumer queue,
//! per the concurrency discipline in spec §5/§9.

use crate::broker::BrokerInfo;
use crate::error::{Error, Result};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

/// MQTT quality of service level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    /// At most once delivery.
    AtMostOnce,
    /// At least once delivery.
    AtLeastOnce,
}

/// Opaque handle correlating a publish call with its later
/// acknowledgement event.
pub type PublishId = u16;

/// Events the runtime's main loop polls from the transport each tick.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// The broker accepted (or rejected) the connection.
    ConnAck {
        /// `true` if the broker accepted the connection.
        success: bool,
    },
    /// A previously submitted publish was acknowledged.
    PubAck {
        /// The id returned by the [`Transport::publish`] call being
        /// acknowledged.
        id: PublishId,
    },
    /// A message arrived on a subscribed topic.
    Message {
        /// The topic the message arrived on.
        topic: String,
        /// The raw payload bytes.
        payload: Vec<u8>,
    },
    /// The connection to the broker was lost.
    Disconnected,
}

/// Abstracts MQTT connect/publish/subscribe so the edge-node state
/// machine can run against either a live broker or a test double.
pub trait Transport: Send {
    /// Registers the MQTT Last Will and Testament, published by the
    /// broker if this client disconnects ungracefully.
    fn set_will(&mut self, topic: &str, qos: Qos, retain: bool, payload: Vec<u8>) -> Result<()>;
    /// Initiates a connection; completion is signaled asynchronously
    /// via a [`NodeEvent::ConnAck`].
    fn connect(&mut self) -> Result<()>;
    /// Disconnects gracefully (the Will is not triggered).
    fn disconnect(&mut self) -> Result<()>;
    /// Subscribes to a topic filter.
    fn subscribe(&mut self, topic: &str) -> Result<()>;
    /// Enqueues a publish; returns an id whose acknowledgement arrives
    /// later as [`NodeEvent::PubAck`].
    fn publish(&mut self, topic: &str, qos: Qos, retain: bool, payload: Vec<u8>) -> Result<PublishId>;
    /// Drains events that arrived since the last poll, without
    /// blocking longer than `timeout`.
    fn poll_events(&mut self, timeout: Duration) -> Vec<NodeEvent>;
}

/// Production [`Transport`] over `rumqttc`.
///
/// The `rumqttc::Connection` event loop runs on a spawned thread that
/// translates `rumqttc` events into [`NodeEvent`]s and forwards them
/// through an `mpsc` channel; the loop thread only ever touches the
/// channel's receiving end.
///
/// Sparkplug's Will must be armed in `MqttOptions` before the MQTT
/// session is opened, but the Will's payload (carrying `bdSeq`) is only
/// known after the edge node is constructed — after `RumqttcTransport`
/// already exists. So client construction is deferred: `new()` just
/// records the broker, `set_will()` stashes the pending Will, and
/// `connect()` builds `MqttOptions` (with the Will attached) and opens
/// the client and event-pump thread.
pub struct RumqttcTransport {
    broker: BrokerInfo,
    pending_will: Option<(String, Qos, bool, Vec<u8>)>,
    client: Option<rumqttc::Client>,
    events: Option<Receiver<NodeEvent>>,
    next_pkid: PublishId,
}

impl RumqttcTransport {
    /// Creates a transport bound to `broker`. No network connection is
    /// made until [`Transport::connect`] is called.
    pub fn new(broker: &BrokerInfo) -> Result<Self> {
        Ok(Self {
            broker: broker.clone(),
            pending_will: None,
            client: None,
            events: None,
            next_pkid: 0,
        })
    }

    fn client_mut(&mut self) -> Result<&mut rumqttc::Client> {
        self.client
            .as_mut()
            .ok_or_else(|| Error::Transport("transport is not connected".into()))
    }
}

fn spawn_event_pump(mut connection: rumqttc::Connection, tx: Sender<NodeEvent>) {
    std::thread::spawn(move || {
        for notification in connection.iter() {
            let event = match notification {
                Ok(rumqttc::Event::Incoming(rumqttc::Packet::ConnAck(ack))) => Some(NodeEvent::ConnAck {
                    success: ack.code == rumqttc::ConnectReturnCode::Success,
                }),
                Ok(rumqttc::Event::Incoming(rumqttc::Packet::PubAck(ack))) => {
                    Some(NodeEvent::PubAck { id: ack.pkid })
                }
                Ok(rumqttc::Event::Incoming(rumqttc::Packet::PubComp(ack))) => {
                    Some(NodeEvent::PubAck { id: ack.pkid })
                }
                Ok(rumqttc::Event::Incoming(rumqttc::Packet::Publish(publish))) => {
                    Some(NodeEvent::Message {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    })
                }
                Ok(_) => None,
                Err(_) => Some(NodeEvent::Disconnected),
            };
            if let Some(event) = event {
                if tx.send(event).is_err() {
                    break;
                }
            }
        }
    });
}

impl Transport for RumqttcTransport {
    fn set_will(&mut self, topic: &str, qos: Qos, retain: bool, payload: Vec<u8>) -> Result<()> {
        self.pending_will = Some((topic.to_string(), qos, retain, payload));
        Ok(())
    }

    fn connect(&mut self) -> Result<()> {
        let mut mqtt_options =
            rumqttc::MqttOptions::new(&self.broker.client_id, &self.broker.host, self.broker.port);
        mqtt_options.set_keep_alive(Duration::from_secs(30));
        if let (Some(user), Some(pass)) = (&self.broker.username, &self.broker.password) {
            mqtt_options.set_credentials(user.clone(), pass.clone());
        }
        if let Some((topic, qos, retain, payload)) = self.pending_will.take() {
            mqtt_options.set_last_will(rumqttc::LastWill::new(
                topic,
                payload,
                to_rumqttc_qos(qos),
                retain,
            ));
        }

        let (client, connection) = rumqttc::Client::new(mqtt_options, 256);
        let (tx, rx) = mpsc::channel();
        spawn_event_pump(connection, tx);
        self.client = Some(client);
        self.events = Some(rx);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.client_mut()?
            .disconnect()
            .map_err(|e| Error::Transport(format!("disconnect failed: {e}")))
    }

    fn subscribe(&mut self, topic: &str) -> Result<()> {
        self.client_mut()?
            .subscribe(topic, rumqttc::QoS::AtLeastOnce)
            .map_err(|e| Error::Transport(format!("subscribe to '{topic}' failed: {e}")))
    }

    fn publish(&mut self, topic: &str, qos: Qos, retain: bool, payload: Vec<u8>) -> Result<PublishId> {
        self.client_mut()?
            .try_publish(topic, to_rumqttc_qos(qos), retain, payload)
            .map_err(|e| Error::Transport(format!("publish to '{topic}' failed: {e}")))?;
        self.next_pkid = self.next_pkid.wrapping_add(1);
        Ok(self.next_pkid)
    }

    fn poll_events(&mut self, timeout: Duration) -> Vec<NodeEvent> {
        let Some(events) = self.events.as_ref() else {
            return Vec::new();
        };
        let mut out = Vec::new();
        while let Ok(event) = events.recv_timeout(timeout) {
            out.push(event);
        }
        out
    }
}

fn to_rumqttc_qos(qos: Qos) -> rumqttc::QoS {
    match qos {
        Qos::AtMostOnce => rumqttc::QoS::AtMostOnce,
        Qos::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
    }
}

/// In-memory [`Transport`] double for unit tests: records every call
/// and lets tests inject [`NodeEvent`]s synchronously without a
/// broker.
#[cfg(test)]
pub struct MockTransport {
    /// Topics a test can inspect to confirm the Will was registered.
    pub will: Option<(String, Qos, bool, Vec<u8>)>,
    /// Every publish the runtime issued, in order.
    pub published: Vec<(String, Qos, bool, Vec<u8>)>,
    /// Topics the runtime subscribed to, in order.
    pub subscribed: Vec<String>,
    /// `true` once `connect()` has been called.
    pub connected: bool,
    next_id: PublishId,
    pending_events: std::collections::VecDeque<NodeEvent>,
}

#[cfg(test)]
impl MockTransport {
    /// Creates an unconnected mock transport.
    pub fn new() -> Self {
        Self {
            will: None,
            published: Vec::new(),
            subscribed: Vec::new(),
            connected: false,
            next_id: 0,
            pending_events: std::collections::VecDeque::new(),
        }
    }

    /// Queues an event to be returned by the next [`Transport::poll_events`] call.
    pub fn push_event(&mut self, event: NodeEvent) {
        self.pending_events.push_back(event);
    }

    /// Queues a `PubAck` for the given publish id.
    pub fn ack(&mut self, id: PublishId) {
        self.push_event(NodeEvent::PubAck { id });
    }
}

#[cfg(test)]
impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Transport for MockTransport {
    fn set_will(&mut self, topic: &str, qos: Qos, retain: bool, payload: Vec<u8>) -> Result<()> {
        self.will = Some((topic.to_string(), qos, retain, payload));
        Ok(())
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        self.pending_events.push_back(NodeEvent::ConnAck { success: true });
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<()> {
        self.subscribed.push(topic.to_string());
        Ok(())
    }

    fn publish(&mut self, topic: &str, qos: Qos, retain: bool, payload: Vec<u8>) -> Result<PublishId> {
        self.next_id = self.next_id.wrapping_add(1);
        let id = self.next_id;
        self.published.push((topic.to_string(), qos, retain, payload));
        self.pending_events.push_back(NodeEvent::PubAck { id });
        Ok(id)
    }

    fn poll_events(&mut self, _timeout: Duration) -> Vec<NodeEvent> {
        self.pending_events.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_records_will_publishes_and_subscriptions() {
        let mut t = MockTransport::new();
        t.set_will("spBv1.0/Factory/NDEATH/Line1", Qos::AtLeastOnce, false, vec![1])
            .unwrap();
        t.connect().unwrap();
        t.subscribe("spBv1.0/Factory/NCMD/Line1").unwrap();
        let id = t
            .publish("spBv1.0/Factory/NBIRTH/Line1", Qos::AtMostOnce, false, vec![2])
            .unwrap();

        assert!(t.will.is_some());
        assert_eq!(t.subscribed, vec!["spBv1.0/Factory/NCMD/Line1".to_string()]);
        assert_eq!(t.published.len(), 1);

        let events = t.poll_events(Duration::from_millis(0));
        assert!(events
            .iter()
            .any(|e| matches!(e, NodeEvent::ConnAck { success: true })));
        assert!(events.iter().any(|e| matches!(e, NodeEvent::PubAck { id: acked } if *acked == id)));
    }
}
