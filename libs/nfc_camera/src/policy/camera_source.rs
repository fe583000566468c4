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

use crate::common::CameraAvailabilityCallback;
use anyhow::{anyhow, bail, Result};
use log::debug;
use std::sync::{Arc, Mutex, MutexGuard};

/// A source of camera availability notifications.
pub trait CameraAvailabilitySource: Send + Sync {
    /// Starts delivering notifications to `callback`.
    fn register_availability_callback(
        &self,
        callback: Arc<dyn CameraAvailabilityCallback>,
    ) -> Result<()>;

    /// Stops delivering notifications to the registered callback.
    fn unregister_availability_callback(&self) -> Result<()>;
}

type CallbackSlot = Option<Arc<dyn CameraAvailabilityCallback>>;

/// Camera source for hosts that receive availability notifications themselves and
/// hand them over through `notify_opened` and `notify_closed`.
///
/// At most one callback can be registered at a time.
#[derive(Default)]
pub struct ForwardingCameraSource {
    callback: Mutex<CallbackSlot>,
}

impl ForwardingCameraSource {
    /// Creates a source with no callback registered.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> Result<MutexGuard<'_, CallbackSlot>> {
        self.callback.lock().map_err(|_| anyhow!("Camera callback slot poisoned"))
    }

    fn registered(&self) -> Option<Arc<dyn CameraAvailabilityCallback>> {
        match self.slot() {
            Ok(slot) => slot.clone(),
            Err(e) => {
                debug!("Dropping camera notification: {}", e);
                None
            }
        }
    }

    /// Returns true if a callback is registered.
    pub fn is_registered(&self) -> bool {
        self.registered().is_some()
    }

    /// Forwards an open of `camera_id` by `package_id` to the registered callback.
    pub fn notify_opened(&self, camera_id: &str, package_id: &str) {
        match self.registered() {
            Some(callback) => callback.on_camera_opened(camera_id, package_id),
            None => debug!("No callback registered, dropping open of camera {}", camera_id),
        }
    }

    /// Forwards a close of `camera_id` to the registered callback.
    pub fn notify_closed(&self, camera_id: &str) {
        match self.registered() {
            Some(callback) => callback.on_camera_closed(camera_id),
            None => debug!("No callback registered, dropping close of camera {}", camera_id),
        }
    }
}

impl CameraAvailabilitySource for ForwardingCameraSource {
    fn register_availability_callback(
        &self,
        callback: Arc<dyn CameraAvailabilityCallback>,
    ) -> Result<()> {
        let mut slot = self.slot()?;
        if slot.is_some() {
            bail!("A camera availability callback is already registered");
        }
        *slot = Some(callback);
        Ok(())
    }

    fn unregister_availability_callback(&self) -> Result<()> {
        self.slot()?.take();
        Ok(())
    }
}
