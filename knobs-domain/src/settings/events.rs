//! Change notifications.
//!
//! [`SettingChangedEvent`] is what the global change stream and listeners
//! receive. [`SettingStream`] is the typed per-key view over the same
//! broadcast, optionally seeded with the value current at subscription.

use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use super::definition::SettingKind;
use super::types::{SettingType, SettingValue};

/// Emitted for every accepted write that changed a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingChangedEvent {
    pub key: String,
    pub setting_type: SettingType,
    pub old_value: SettingValue,
    pub new_value: SettingValue,
}

impl SettingChangedEvent {
    pub fn new(key: impl Into<String>, old_value: SettingValue, new_value: SettingValue) -> Self {
        Self {
            key: key.into(),
            setting_type: new_value.setting_type(),
            old_value,
            new_value,
        }
    }
}

/// Token returned by `add_listener`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

/// Typed stream of one setting's values.
///
/// Slow receivers skip what they missed instead of failing. The stream ends
/// when the controller is disposed.
#[derive(Debug)]
pub struct SettingStream<T: SettingKind> {
    initial: Option<T>,
    receiver: broadcast::Receiver<SettingValue>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: SettingKind> SettingStream<T> {
    pub(crate) fn new(receiver: broadcast::Receiver<SettingValue>, initial: Option<T>) -> Self {
        Self {
            initial,
            receiver,
            _marker: PhantomData,
        }
    }

    /// Waits for the next value, or `None` once the stream is closed.
    pub async fn recv(&mut self) -> Option<T> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }
        loop {
            match self.receiver.recv().await {
                Ok(value) => match T::from_value(&value) {
                    Some(typed) => return Some(typed),
                    None => debug!("SettingStream: skipping value of unexpected type {:?}", value),
                },
                Err(RecvError::Lagged(skipped)) => {
                    debug!("SettingStream: receiver lagged, skipped {} values", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns an immediately available value without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }
        loop {
            match self.receiver.try_recv() {
                Ok(value) => {
                    if let Some(typed) = T::from_value(&value) {
                        return Some(typed);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
