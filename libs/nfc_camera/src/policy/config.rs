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

use anyhow::{bail, Result};
use std::collections::HashSet;
use std::time::Duration;

/// Camera id of the front facing camera.
pub const DEFAULT_WATCHED_CAMERA_ID: &str = "1";

/// Maximum pause accepted by the NFC service.
pub const DEFAULT_MAX_PAUSE_TIMEOUT: Duration = Duration::from_millis(40_000);

/// Extra time waited past the pause timeout before pausing again.
pub const DEFAULT_REASSERTION_MARGIN: Duration = Duration::from_millis(100);

/// Packages whose camera use never pauses polling.
pub const DEFAULT_EXEMPT_PACKAGES: [&str; 2] = [
    "co.aospa.sense", // face unlock
    "com.google.android.as", // auto rotate, screen attention etc
];

/// Configuration for the NFC camera polling policy.
#[derive(Debug, Clone)]
pub struct NfcCameraConfig {
    watched_camera_id: String,
    exempt_packages: HashSet<String>,
    max_pause_timeout: Duration,
    reassertion_margin: Duration,
}

impl NfcCameraConfig {
    /// Creates a configuration watching the front camera with the default exemptions.
    pub fn new() -> Self {
        Self {
            watched_camera_id: DEFAULT_WATCHED_CAMERA_ID.to_string(),
            exempt_packages: DEFAULT_EXEMPT_PACKAGES.iter().map(|p| p.to_string()).collect(),
            max_pause_timeout: DEFAULT_MAX_PAUSE_TIMEOUT,
            reassertion_margin: DEFAULT_REASSERTION_MARGIN,
        }
    }

    /// Watches `camera_id` instead of the front camera.
    pub fn with_watched_camera_id(mut self, camera_id: impl Into<String>) -> Self {
        self.watched_camera_id = camera_id.into();
        self
    }

    /// Replaces the set of exempt packages.
    pub fn with_exempt_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exempt_packages = packages.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the pause duration requested from the adapter.
    pub fn with_max_pause_timeout(mut self, timeout: Duration) -> Self {
        self.max_pause_timeout = timeout;
        self
    }

    /// Sets the time waited past the pause timeout before re-asserting the pause.
    pub fn with_reassertion_margin(mut self, margin: Duration) -> Self {
        self.reassertion_margin = margin;
        self
    }

    /// Returns the id of the camera whose use pauses polling.
    pub fn watched_camera_id(&self) -> &str {
        &self.watched_camera_id
    }

    /// Returns the pause duration requested from the adapter.
    pub fn max_pause_timeout(&self) -> Duration {
        self.max_pause_timeout
    }

    /// Returns true if `package_id` may use the watched camera without pausing polling.
    pub fn is_exempt(&self, package_id: &str) -> bool {
        self.exempt_packages.contains(package_id)
    }

    /// Returns true if an open of `camera_id` by `package_id` puts the camera in use.
    pub fn is_watched_use(&self, camera_id: &str, package_id: &str) -> bool {
        camera_id == self.watched_camera_id && !self.is_exempt(package_id)
    }

    /// Delay between a pause request and its re-assertion. Always longer than the
    /// pause timeout of a valid configuration.
    pub fn reassertion_delay(&self) -> Duration {
        self.max_pause_timeout.saturating_add(self.reassertion_margin)
    }

    /// Checks that the configuration can drive the adapter.
    pub fn validate(&self) -> Result<()> {
        if self.watched_camera_id.is_empty() {
            bail!("Watched camera id must not be empty");
        }
        if self.max_pause_timeout.is_zero() {
            bail!("Max pause timeout must be non-zero");
        }
        if self.max_pause_timeout.as_millis() > i32::MAX as u128 {
            bail!("Max pause timeout {:?} does not fit the adapter's range", self.max_pause_timeout);
        }
        if self.reassertion_margin.is_zero() {
            bail!("Re-assertion margin must be non-zero");
        }
        match self.max_pause_timeout.checked_add(self.reassertion_margin) {
            Some(delay) if delay.as_millis() <= i32::MAX as u128 => {}
            _ => bail!(
                "Re-assertion margin {:?} puts the re-assertion delay out of range",
                self.reassertion_margin
            ),
        }
        Ok(())
    }
}

impl Default for NfcCameraConfig {
    fn default() -> Self {
        Self::new()
    }
}
