//! MQTT broker adapter.
//!
//! Implements [`BrokerPort`] on top of `esp_idf_svc::mqtt::client`.  The
//! ESP-IDF client reports connection changes and messages from its own
//! task; the callback only pushes them onto a shared queue which the sync
//! channel drains with [`BrokerPort::poll_event`] on its tick.
//!
//! Payloads larger than [`MAX_PAYLOAD_BYTES`] and fragmented deliveries are
//! dropped in the callback.

use log::{info, warn};

use crate::app::ports::{BrokerEvent, BrokerPort};
use crate::error::TransportError;
use crate::sync::MAX_PAYLOAD_BYTES;

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    Details, EspMqttClient, EventPayload, MqttClientConfiguration, QoS,
};

/// Events buffered between two ticks before new ones are dropped.
const EVENT_QUEUE_DEPTH: usize = 16;

/// Client task → sync channel.
type EventQueue = Arc<Channel<CriticalSectionRawMutex, BrokerEvent, EVENT_QUEUE_DEPTH>>;

fn push_event(queue: &EventQueue, event: BrokerEvent) {
    if queue.try_send(event).is_err() {
        warn!("MQTT: event queue full, dropping event");
    }
}

/// Broker endpoint and credentials.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl BrokerSettings {
    pub fn url(&self) -> String {
        format!("mqtt://{}:{}", self.host, self.port)
    }
}

pub struct MqttAdapter {
    settings: BrokerSettings,
    events: EventQueue,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(not(target_os = "espidf"))]
    sim_session: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_published: Vec<(String, Vec<u8>)>,
}

impl MqttAdapter {
    pub fn new(settings: BrokerSettings) -> Self {
        Self {
            settings,
            events: Arc::new(Channel::new()),
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(not(target_os = "espidf"))]
            sim_session: false,
            #[cfg(not(target_os = "espidf"))]
            sim_published: Vec::new(),
        }
    }

    /// Inject an inbound message as if the broker had delivered it.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_deliver(&mut self, topic: &str, payload: &[u8]) {
        if payload.len() > MAX_PAYLOAD_BYTES {
            warn!("MQTT(sim): dropping oversized payload ({} bytes)", payload.len());
            return;
        }
        push_event(
            &self.events,
            BrokerEvent::Message {
                topic: topic.into(),
                payload: payload.to_vec(),
            },
        );
    }

    /// Messages published so far in simulation.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_published(&self) -> &[(String, Vec<u8>)] {
        &self.sim_published
    }
}

impl BrokerPort for MqttAdapter {
    #[cfg(target_os = "espidf")]
    fn connect(&mut self, client_id: &str) -> Result<(), TransportError> {
        // Dropping an old client stops its task before a new one starts.
        self.client = None;

        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            username: (!self.settings.username.is_empty())
                .then_some(self.settings.username.as_str()),
            password: (!self.settings.password.is_empty())
                .then_some(self.settings.password.as_str()),
            ..Default::default()
        };
        let queue = Arc::clone(&self.events);
        let url = self.settings.url();
        let client = EspMqttClient::new_cb(&url, &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => push_event(&queue, BrokerEvent::Connected),
            EventPayload::Disconnected => push_event(&queue, BrokerEvent::Disconnected),
            EventPayload::Received {
                topic: Some(topic),
                data,
                details,
                ..
            } => {
                if !matches!(details, Details::Complete) {
                    warn!("MQTT: fragmented payload on {} dropped", topic);
                } else if data.len() > MAX_PAYLOAD_BYTES {
                    warn!("MQTT: oversized payload on {} ({} bytes) dropped", topic, data.len());
                } else {
                    push_event(
                        &queue,
                        BrokerEvent::Message {
                            topic: topic.into(),
                            payload: data.to_vec(),
                        },
                    );
                }
            }
            _ => {}
        })
        .map_err(|e| {
            warn!("MQTT: client start failed: {:?}", e);
            TransportError::ConnectFailed
        })?;
        info!("MQTT: connecting to {}", url);
        self.client = Some(client);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn connect(&mut self, client_id: &str) -> Result<(), TransportError> {
        info!("MQTT(sim): {} connecting to {}", client_id, self.settings.url());
        self.sim_session = true;
        push_event(&self.events, BrokerEvent::Connected);
        Ok(())
    }

    fn disconnect(&mut self) {
        #[cfg(target_os = "espidf")]
        {
            self.client = None;
        }
        #[cfg(not(target_os = "espidf"))]
        {
            self.sim_session = false;
        }
        // Handshake results of the old session must not reach the next one;
        // messages already received are still handed over.
        let mut kept = heapless::Vec::<BrokerEvent, EVENT_QUEUE_DEPTH>::new();
        while let Ok(event) = self.events.try_receive() {
            if let BrokerEvent::Message { .. } = event {
                let _ = kept.push(event);
            }
        }
        for event in kept {
            push_event(&self.events, event);
        }
        info!("MQTT: session closed");
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        #[cfg(target_os = "espidf")]
        {
            let client = self.client.as_mut().ok_or(TransportError::NotConnected)?;
            client
                .enqueue(topic, QoS::AtLeastOnce, false, payload)
                .map(|_| ())
                .map_err(|_| TransportError::PublishFailed)
        }
        #[cfg(not(target_os = "espidf"))]
        {
            if !self.sim_session {
                return Err(TransportError::NotConnected);
            }
            self.sim_published.push((topic.into(), payload.to_vec()));
            Ok(())
        }
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        #[cfg(target_os = "espidf")]
        {
            let client = self.client.as_mut().ok_or(TransportError::NotConnected)?;
            client
                .subscribe(topic, QoS::AtLeastOnce)
                .map(|_| ())
                .map_err(|_| TransportError::SubscribeFailed)
        }
        #[cfg(not(target_os = "espidf"))]
        {
            if !self.sim_session {
                return Err(TransportError::NotConnected);
            }
            info!("MQTT(sim): subscribed to {}", topic);
            Ok(())
        }
    }

    fn poll_event(&mut self) -> Option<BrokerEvent> {
        self.events.try_receive().ok()
    }
}
