//! Callback registry for the event-driven clients.
//!
//! One optional slot per gateway-to-client frame kind. Registration is
//! fluent and happens before connect; a frame arriving for an unregistered
//! slot is logged and dropped, never an error. The ERROR frame and local
//! failures (decode errors after authorization, transport faults) both land
//! in the error slot.

use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::protocol::{
    Command, DatalogReadResult, DeviceInfo, DeviceMessage, ExtensionCallResult, Message,
    MessagesReadResult, PropertyDescription, PropertyReadResult, PropertySubscriptionResult,
    PropertyValue, PropertyWriteResult,
};

type Slot<T> = Option<Box<dyn Fn(&T) + Send>>;

/// Callbacks invoked by the receive loop, in frame arrival order.
#[derive(Default)]
pub struct EventHandlers {
    enumerated: Slot<[DeviceInfo]>,
    description: Slot<[PropertyDescription]>,
    properties_found: Slot<[String]>,
    property_read: Slot<PropertyReadResult>,
    properties_read: Slot<[PropertyReadResult]>,
    property_written: Slot<PropertyWriteResult>,
    property_subscribed: Slot<PropertySubscriptionResult>,
    properties_subscribed: Slot<[PropertySubscriptionResult]>,
    property_unsubscribed: Slot<PropertySubscriptionResult>,
    properties_unsubscribed: Slot<[PropertySubscriptionResult]>,
    property_updated: Option<Box<dyn Fn(&str, &PropertyValue) + Send>>,
    datalog_properties_read: Slot<[String]>,
    datalog_read: Slot<DatalogReadResult>,
    messages_read: Slot<MessagesReadResult>,
    device_message: Slot<DeviceMessage>,
    extension_called: Slot<ExtensionCallResult>,
    error: Slot<GatewayError>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_enumerated(mut self, f: impl Fn(&[DeviceInfo]) + Send + 'static) -> Self {
        self.enumerated = Some(Box::new(f));
        self
    }

    pub fn on_description(mut self, f: impl Fn(&[PropertyDescription]) + Send + 'static) -> Self {
        self.description = Some(Box::new(f));
        self
    }

    pub fn on_properties_found(mut self, f: impl Fn(&[String]) + Send + 'static) -> Self {
        self.properties_found = Some(Box::new(f));
        self
    }

    pub fn on_property_read(mut self, f: impl Fn(&PropertyReadResult) + Send + 'static) -> Self {
        self.property_read = Some(Box::new(f));
        self
    }

    pub fn on_properties_read(
        mut self,
        f: impl Fn(&[PropertyReadResult]) + Send + 'static,
    ) -> Self {
        self.properties_read = Some(Box::new(f));
        self
    }

    pub fn on_property_written(
        mut self,
        f: impl Fn(&PropertyWriteResult) + Send + 'static,
    ) -> Self {
        self.property_written = Some(Box::new(f));
        self
    }

    pub fn on_property_subscribed(
        mut self,
        f: impl Fn(&PropertySubscriptionResult) + Send + 'static,
    ) -> Self {
        self.property_subscribed = Some(Box::new(f));
        self
    }

    pub fn on_properties_subscribed(
        mut self,
        f: impl Fn(&[PropertySubscriptionResult]) + Send + 'static,
    ) -> Self {
        self.properties_subscribed = Some(Box::new(f));
        self
    }

    pub fn on_property_unsubscribed(
        mut self,
        f: impl Fn(&PropertySubscriptionResult) + Send + 'static,
    ) -> Self {
        self.property_unsubscribed = Some(Box::new(f));
        self
    }

    pub fn on_properties_unsubscribed(
        mut self,
        f: impl Fn(&[PropertySubscriptionResult]) + Send + 'static,
    ) -> Self {
        self.properties_unsubscribed = Some(Box::new(f));
        self
    }

    pub fn on_property_updated(
        mut self,
        f: impl Fn(&str, &PropertyValue) + Send + 'static,
    ) -> Self {
        self.property_updated = Some(Box::new(f));
        self
    }

    pub fn on_datalog_properties_read(mut self, f: impl Fn(&[String]) + Send + 'static) -> Self {
        self.datalog_properties_read = Some(Box::new(f));
        self
    }

    pub fn on_datalog_read(mut self, f: impl Fn(&DatalogReadResult) + Send + 'static) -> Self {
        self.datalog_read = Some(Box::new(f));
        self
    }

    pub fn on_messages_read(mut self, f: impl Fn(&MessagesReadResult) + Send + 'static) -> Self {
        self.messages_read = Some(Box::new(f));
        self
    }

    pub fn on_device_message(mut self, f: impl Fn(&DeviceMessage) + Send + 'static) -> Self {
        self.device_message = Some(Box::new(f));
        self
    }

    pub fn on_extension_called(
        mut self,
        f: impl Fn(&ExtensionCallResult) + Send + 'static,
    ) -> Self {
        self.extension_called = Some(Box::new(f));
        self
    }

    /// Invoked for ERROR frames (as [`GatewayError::Gateway`]) and for local
    /// post-authorization failures.
    pub fn on_error(mut self, f: impl Fn(&GatewayError) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    /// Route one decoded frame to its slot.
    pub(crate) fn dispatch(&self, message: Message) {
        match message {
            Message::Authorized { .. } => {
                // The handshake consumed the one expected AUTHORIZED.
                debug!("dropping repeated AUTHORIZED frame");
            }
            Message::Enumerated { devices } => {
                invoke(&self.enumerated, Command::Enumerated, &devices)
            }
            Message::Description { properties } => {
                invoke(&self.description, Command::Description, &properties)
            }
            Message::PropertiesFound { ids } => {
                invoke(&self.properties_found, Command::PropertiesFound, &ids)
            }
            Message::PropertyRead { result } => {
                invoke(&self.property_read, Command::PropertyRead, &result)
            }
            Message::PropertiesRead { results } => {
                invoke(&self.properties_read, Command::PropertiesRead, &results)
            }
            Message::PropertyWritten { result } => {
                invoke(&self.property_written, Command::PropertyWritten, &result)
            }
            Message::PropertySubscribed { result } => invoke(
                &self.property_subscribed,
                Command::PropertySubscribed,
                &result,
            ),
            Message::PropertiesSubscribed { results } => invoke(
                &self.properties_subscribed,
                Command::PropertiesSubscribed,
                &results,
            ),
            Message::PropertyUnsubscribed { result } => invoke(
                &self.property_unsubscribed,
                Command::PropertyUnsubscribed,
                &result,
            ),
            Message::PropertiesUnsubscribed { results } => invoke(
                &self.properties_unsubscribed,
                Command::PropertiesUnsubscribed,
                &results,
            ),
            Message::PropertyUpdate { id, value } => match &self.property_updated {
                Some(callback) => callback(&id, &value),
                None => debug!(command = ?Command::PropertyUpdate, "no handler registered, dropping frame"),
            },
            Message::DatalogPropertiesRead { ids } => invoke(
                &self.datalog_properties_read,
                Command::DatalogPropertiesRead,
                &ids,
            ),
            Message::DatalogRead { result } => {
                invoke(&self.datalog_read, Command::DatalogRead, &result)
            }
            Message::MessagesRead { result } => {
                invoke(&self.messages_read, Command::MessagesRead, &result)
            }
            Message::DeviceMessage { message } => {
                invoke(&self.device_message, Command::DeviceMessage, &message)
            }
            Message::ExtensionCalled { result } => {
                invoke(&self.extension_called, Command::ExtensionCalled, &result)
            }
            Message::Error { reason } => self.error(&GatewayError::Gateway(reason)),
            other => {
                // Request-direction frames never travel gateway-to-client.
                warn!(command = ?other.command(), "ignoring request-direction frame");
            }
        }
    }

    /// Route a local failure to the error slot.
    pub(crate) fn error(&self, err: &GatewayError) {
        match &self.error {
            Some(callback) => callback(err),
            None => debug!(error = %err, "no error handler registered"),
        }
    }
}

fn invoke<T: ?Sized>(slot: &Slot<T>, command: Command, value: &T) {
    match slot {
        Some(callback) => callback(value),
        None => debug!(command = ?command, "no handler registered, dropping frame"),
    }
}
