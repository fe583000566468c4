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

//! # Policy Engine
//!
//! This module provides the main public-facing API for the library.
//!
//! The `NfcCameraEngine` struct is the primary entry point for consumers of this
//! crate. It encapsulates the `NfcCameraCoordinator` together with the runtime its
//! task runs on.

use crate::camera_source::CameraAvailabilitySource;
use crate::common::{CameraAvailabilityCallback, NfcAdapterProvider, PollingStatus};
use crate::config::NfcCameraConfig;
use crate::polling_coordinator::NfcCameraCoordinator;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::runtime::Runtime;

/// The main engine that encapsulates all policy logic.
///
/// This struct is the primary entry point for the library.
pub struct NfcCameraEngine {
    /// The embedded `NfcCameraCoordinator` that handles core logic.
    pub coordinator: NfcCameraCoordinator,
    /// The Tokio runtime for the coordinator's task. Must be dropped after `coordinator`.
    runtime: Runtime,
}

impl NfcCameraEngine {
    /// Create a new NfcCameraEngine and associated members.
    pub fn new(
        config: NfcCameraConfig,
        camera_source: Arc<dyn CameraAvailabilitySource>,
        adapter_provider: Arc<dyn NfcAdapterProvider>,
    ) -> Result<Self> {
        // One worker keeps every policy decision on the same thread.
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("nfc_camera_policy")
            .enable_all()
            .build()
            .context("Failed to create Tokio runtime for NfcCameraEngine")?;
        let coordinator = {
            let _guard = runtime.enter();
            NfcCameraCoordinator::new(config, camera_source, adapter_provider)?
        };

        Ok(Self { coordinator, runtime })
    }

    /// Registers for camera availability notifications.
    pub fn start(&mut self) -> Result<()> {
        self.coordinator.start()
    }

    /// Unregisters from camera availability and cancels any pending re-assertion.
    pub fn stop(&mut self) {
        self.coordinator.stop();
    }

    /// Blocks until the policy state reflects every previously delivered event.
    ///
    /// Must not be called from within an async context.
    pub fn status(&self) -> Result<PollingStatus> {
        self.runtime.block_on(self.coordinator.status())
    }
}

impl CameraAvailabilityCallback for NfcCameraEngine {
    fn on_camera_opened(&self, camera_id: &str, package_id: &str) {
        self.coordinator.on_camera_opened(camera_id, package_id);
    }

    fn on_camera_closed(&self, camera_id: &str) {
        self.coordinator.on_camera_closed(camera_id);
    }
}
