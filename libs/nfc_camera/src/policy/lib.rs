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

//! # NFC Camera Policy Engine
//!
//! This crate pauses NFC polling while a watched camera (the front camera by
//! default) is opened by a package that is not exempt, and resumes it once the
//! camera is closed. The NFC field is kept off for the whole time the camera is in
//! use by re-asserting the pause before the adapter's maximum pause expires.
//!
//! Camera availability notifications are fed in through a
//! `CameraAvailabilitySource`, and NFC is driven through the `NfcAdapter` trait.
//! All policy decisions run serially on a single background task.
//!
//! The primary entry point for this library is the `NfcCameraEngine` struct.

/// Camera availability registration and the forwarding source used by foreign hosts.
pub mod camera_source;
/// Defines shared data structures and the collaborator traits.
pub mod common;
/// Tunables for the polling policy.
pub mod config;
/// Provides the main public-facing API for the library.
pub mod policy_engine;
/// Implements the core polling policy and its event task.
pub mod polling_coordinator;
/// Decides whether the feature should run on this device.
pub mod service_host;
