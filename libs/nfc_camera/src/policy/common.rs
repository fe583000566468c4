// Copyright (C) 2026 The Android Open Source Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Common
//!
//! This module contains shared data structures and the traits through which the
//! policy talks to the camera and NFC subsystems.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// Enum for the NFC polling state machine.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PollingState {
    /// Polling is not being paused by this policy.
    Idle,
    /// A pause has been requested and its re-assertion is owned by the policy.
    Pausing,
}

/// A point-in-time view of the policy state.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PollingStatus {
    /// Whether the watched camera is open by a package that is not exempt.
    pub camera_in_use: bool,
    /// The current state of the polling state machine.
    pub polling_state: PollingState,
    /// Whether a re-assertion deadline is armed.
    pub reassertion_pending: bool,
}

/// The NFC control surface driven by the policy.
///
/// Implementations are expected to return quickly, since every call is made from
/// the policy's event task.
pub trait NfcAdapter: Send + Sync {
    /// Returns true if NFC is currently enabled.
    fn is_enabled(&self) -> bool;

    /// Pauses polling for at most `max_duration`, after which the adapter resumes
    /// polling on its own.
    fn pause_polling(&self, max_duration: Duration) -> Result<()>;

    /// Resumes polling.
    fn resume_polling(&self) -> Result<()>;
}

/// Resolves the default NFC adapter.
///
/// Resolution is attempted lazily from the policy task and retried on the next
/// evaluation if it fails.
pub trait NfcAdapterProvider: Send + Sync {
    /// Returns the default adapter, or an error if NFC is not available.
    fn default_adapter(&self) -> Result<Arc<dyn NfcAdapter>>;
}

/// Receives camera availability notifications.
pub trait CameraAvailabilityCallback: Send + Sync {
    /// Called when `camera_id` has been opened by `package_id`.
    fn on_camera_opened(&self, camera_id: &str, package_id: &str);

    /// Called when `camera_id` has been closed.
    fn on_camera_closed(&self, camera_id: &str);
}
