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

//! Start-up gate deciding whether the policy runs on this device.

use log::info;

/// System feature advertised by devices with NFC hardware.
pub const FEATURE_NFC: &str = "android.hardware.nfc";

/// Setting this property to true disables the policy.
pub const PAUSE_POLLING_DISABLED_PROPERTY: &str = "persist.nfc.camera.pause_polling";

/// Host facilities consulted before starting the policy.
pub trait HostEnvironment {
    /// Returns true if the device advertises the system feature `name`.
    fn has_system_feature(&self, name: &str) -> bool;

    /// Returns the boolean system property `key`, or `default` if unset.
    fn get_bool_property(&self, key: &str, default: bool) -> bool;
}

/// Outcome of the start-up gate.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StartDecision {
    /// The device has no NFC hardware.
    NoNfcFeature,
    /// The policy is turned off through `PAUSE_POLLING_DISABLED_PROPERTY`.
    DisabledByProperty,
    /// The policy should be started.
    Start,
}

impl StartDecision {
    /// Evaluates the gate against `host`.
    pub fn evaluate(host: &dyn HostEnvironment) -> Self {
        if !host.has_system_feature(FEATURE_NFC) {
            info!("No nfc on this device");
            StartDecision::NoNfcFeature
        } else if host.get_bool_property(PAUSE_POLLING_DISABLED_PROPERTY, false) {
            info!("Disabled via system prop");
            StartDecision::DisabledByProperty
        } else {
            info!("Starting NFC camera polling policy");
            StartDecision::Start
        }
    }

    /// Returns true if the policy should be started.
    pub fn should_start(self) -> bool {
        self == StartDecision::Start
    }
}
