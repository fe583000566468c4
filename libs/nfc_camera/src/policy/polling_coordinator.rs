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

use crate::camera_source::CameraAvailabilitySource;
use crate::common::{
    CameraAvailabilityCallback, NfcAdapter, NfcAdapterProvider, PollingState, PollingStatus,
};
use crate::config::NfcCameraConfig;
use anyhow::{anyhow, Result};
use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};

/// Event sent to the NfcCameraTask.
#[derive(Debug)]
enum CameraServiceEvent {
    CameraOpened { camera_id: String, package_id: String },
    CameraClosed { camera_id: String },
    Stop,
    QueryStatus(oneshot::Sender<PollingStatus>),
    Shutdown,
}

/// Internal service that runs the polling policy on a single task.
struct NfcCameraTask {
    event_receiver: mpsc::UnboundedReceiver<CameraServiceEvent>,
    adapter_provider: Arc<dyn NfcAdapterProvider>,
    adapter: Option<Arc<dyn NfcAdapter>>,
    config: NfcCameraConfig,
    camera_in_use: bool,
    polling_state: PollingState,
    /// The single re-assertion timer slot.
    reassertion_deadline: Option<Instant>,
}

impl NfcCameraTask {
    fn new(
        event_receiver: mpsc::UnboundedReceiver<CameraServiceEvent>,
        adapter_provider: Arc<dyn NfcAdapterProvider>,
        config: NfcCameraConfig,
    ) -> Self {
        Self {
            event_receiver,
            adapter_provider,
            adapter: None,
            config,
            camera_in_use: false,
            polling_state: PollingState::Idle,
            reassertion_deadline: None,
        }
    }

    fn status(&self) -> PollingStatus {
        PollingStatus {
            camera_in_use: self.camera_in_use,
            polling_state: self.polling_state,
            reassertion_pending: self.reassertion_deadline.is_some(),
        }
    }

    /// Returns the cached adapter, resolving it first if needed.
    fn nfc_adapter(&mut self) -> Option<Arc<dyn NfcAdapter>> {
        if self.adapter.is_none() {
            debug!("nfc_adapter: adapter not resolved yet");
            match self.adapter_provider.default_adapter() {
                Ok(adapter) => self.adapter = Some(adapter),
                Err(e) => error!("Failed to get NFC adapter: {:#}", e),
            }
        }
        self.adapter.clone()
    }

    fn cancel_reassertion(&mut self) {
        if self.reassertion_deadline.take().is_some() {
            debug!("Cancelled pending pause re-assertion");
        }
    }

    /// Pauses polling and arms the re-assertion deadline past the pause timeout.
    fn pause_polling(&mut self, adapter: &dyn NfcAdapter) {
        if let Err(e) = adapter.pause_polling(self.config.max_pause_timeout()) {
            error!("Failed to pause NFC polling: {:#}", e);
        }
        self.reassertion_deadline = Some(Instant::now() + self.config.reassertion_delay());
        self.polling_state = PollingState::Pausing;
    }

    /// Applies the current camera use state to the adapter.
    fn update_polling_state(&mut self) {
        let Some(adapter) = self.nfc_adapter() else {
            error!("update_polling_state: NFC adapter is unavailable");
            return;
        };
        if !adapter.is_enabled() {
            debug!("update_polling_state: nfc is disabled");
            return;
        }

        if self.camera_in_use {
            info!("Watched camera in use, pause polling");
            self.pause_polling(adapter.as_ref());
        } else {
            info!("Watched camera not in use, resume polling");
            self.cancel_reassertion();
            if let Err(e) = adapter.resume_polling() {
                error!("Failed to resume NFC polling: {:#}", e);
            }
            self.polling_state = PollingState::Idle;
        }
    }

    /// Handles expiry of the re-assertion deadline.
    fn handle_reassertion_timeout(&mut self) {
        self.reassertion_deadline = None;
        if !self.camera_in_use {
            debug!("Re-assertion expired after camera was released");
            self.polling_state = PollingState::Idle;
            return;
        }
        let Some(adapter) = self.nfc_adapter() else {
            error!("handle_reassertion_timeout: NFC adapter is unavailable");
            self.polling_state = PollingState::Idle;
            return;
        };
        if adapter.is_enabled() {
            info!("Watched camera still in use, polling pause timed out, pausing again");
            self.pause_polling(adapter.as_ref());
        } else {
            debug!("handle_reassertion_timeout: nfc is disabled");
            self.polling_state = PollingState::Idle;
        }
    }

    /// Handles a received service event. Returns true if the service should continue running.
    fn handle_service_event(&mut self, service_event: CameraServiceEvent) -> bool {
        match service_event {
            CameraServiceEvent::CameraOpened { camera_id, package_id } => {
                debug!("onCameraOpened id={} package={}", camera_id, package_id);
                if self.config.is_watched_use(&camera_id, &package_id) && !self.camera_in_use {
                    self.camera_in_use = true;
                    self.update_polling_state();
                }
            }
            CameraServiceEvent::CameraClosed { camera_id } => {
                debug!("onCameraClosed id={}", camera_id);
                if camera_id == self.config.watched_camera_id() && self.camera_in_use {
                    self.camera_in_use = false;
                    self.update_polling_state();
                }
            }
            CameraServiceEvent::Stop => {
                info!("Stopped, no longer re-asserting polling pause");
                // Closes are not seen while unregistered.
                self.camera_in_use = false;
                self.cancel_reassertion();
                self.polling_state = PollingState::Idle;
            }
            CameraServiceEvent::QueryStatus(reply) => {
                // The requester may have given up waiting.
                let _ = reply.send(self.status());
            }
            CameraServiceEvent::Shutdown => {
                return false;
            }
        }
        true
    }

    async fn wait_for_deadline(deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }

    /// Runs the event loop.
    async fn run(mut self) {
        info!("NfcCameraTask started.");
        loop {
            tokio::select! {
                // Events first, so a close queued at expiry cancels the re-assertion.
                biased;
                service_event = self.event_receiver.recv() => {
                    match service_event {
                        Some(service_event) => {
                            if !self.handle_service_event(service_event) {
                                info!("Shutdown event received.");
                                break;
                            }
                        }
                        None => {
                            info!("Event channel closed. Shutting down.");
                            break;
                        }
                    }
                }
                _ = Self::wait_for_deadline(self.reassertion_deadline) => {
                    self.handle_reassertion_timeout();
                }
            }
        }
    }
}

/// Forwards camera notifications from a camera source into the task's queue.
struct CameraEventForwarder {
    event_sender: mpsc::UnboundedSender<CameraServiceEvent>,
}

impl CameraEventForwarder {
    fn send_event(&self, event: CameraServiceEvent) {
        if self.event_sender.send(event).is_err() {
            error!("Event channel closed. Service might have crashed.");
        }
    }
}

impl CameraAvailabilityCallback for CameraEventForwarder {
    fn on_camera_opened(&self, camera_id: &str, package_id: &str) {
        self.send_event(CameraServiceEvent::CameraOpened {
            camera_id: camera_id.to_string(),
            package_id: package_id.to_string(),
        });
    }

    fn on_camera_closed(&self, camera_id: &str) {
        self.send_event(CameraServiceEvent::CameraClosed { camera_id: camera_id.to_string() });
    }
}

/// Drives NFC polling from camera availability and owns the NfcCameraTask.
///
/// Must be created from within a Tokio runtime.
pub struct NfcCameraCoordinator {
    forwarder: Arc<CameraEventForwarder>,
    camera_source: Arc<dyn CameraAvailabilitySource>,
    registered: bool,
    service_task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl NfcCameraCoordinator {
    /// Creates a new NfcCameraCoordinator and spawns its task.
    pub fn new(
        config: NfcCameraConfig,
        camera_source: Arc<dyn CameraAvailabilitySource>,
        adapter_provider: Arc<dyn NfcAdapterProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let (tx, rx) = mpsc::unbounded_channel();

        let service = NfcCameraTask::new(rx, adapter_provider, config);
        let service_task_handle = tokio::spawn(service.run());

        Ok(Self {
            forwarder: Arc::new(CameraEventForwarder { event_sender: tx }),
            camera_source,
            registered: false,
            service_task_handle: Some(service_task_handle),
        })
    }

    /// Registers for camera availability notifications.
    pub fn start(&mut self) -> Result<()> {
        self.camera_source.register_availability_callback(self.forwarder.clone())?;
        self.registered = true;
        info!("Registered for camera availability");
        Ok(())
    }

    /// Unregisters from camera availability and cancels any pending pause re-assertion.
    pub fn stop(&mut self) {
        if self.registered {
            if let Err(e) = self.camera_source.unregister_availability_callback() {
                error!("Failed to unregister camera availability callback: {:#}", e);
            }
            self.registered = false;
        }
        self.forwarder.send_event(CameraServiceEvent::Stop);
    }

    /// Returns the policy state once every previously delivered event is handled.
    pub async fn status(&self) -> Result<PollingStatus> {
        let (tx, rx) = oneshot::channel();
        self.forwarder
            .event_sender
            .send(CameraServiceEvent::QueryStatus(tx))
            .map_err(|_| anyhow!("NfcCameraTask is not running"))?;
        rx.await.map_err(|_| anyhow!("NfcCameraTask exited before replying"))
    }
}

impl CameraAvailabilityCallback for NfcCameraCoordinator {
    fn on_camera_opened(&self, camera_id: &str, package_id: &str) {
        self.forwarder.on_camera_opened(camera_id, package_id);
    }

    fn on_camera_closed(&self, camera_id: &str) {
        self.forwarder.on_camera_closed(camera_id);
    }
}

impl Drop for NfcCameraCoordinator {
    fn drop(&mut self) {
        info!("NfcCameraCoordinator dropping. Shutting down NfcCameraTask.");
        if self.registered {
            self.stop();
        }

        if self.forwarder.event_sender.send(CameraServiceEvent::Shutdown).is_err() {
            error!("Failed to send shutdown signal to NfcCameraTask, channel already closed.");
        }

        if let Some(_handle) = self.service_task_handle.take() {
            info!("NfcCameraTask shutdown initiated. The task will be managed by the Tokio runtime.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    enum Call {
        Pause(Duration),
        Resume,
    }

    struct FakeAdapter {
        enabled: AtomicBool,
        /// Number of upcoming pause requests that fail.
        pause_failures: AtomicUsize,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeAdapter {
        fn new(enabled: bool) -> Arc<Self> {
            Arc::new(Self {
                enabled: AtomicBool::new(enabled),
                pause_failures: AtomicUsize::new(0),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn take_calls(&self) -> Vec<Call> {
            std::mem::take(&mut *self.calls.lock().unwrap())
        }
    }

    impl NfcAdapter for FakeAdapter {
        fn is_enabled(&self) -> bool {
            self.enabled.load(Ordering::SeqCst)
        }

        fn pause_polling(&self, max_duration: Duration) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Pause(max_duration));
            if self.pause_failures.load(Ordering::SeqCst) > 0 {
                self.pause_failures.fetch_sub(1, Ordering::SeqCst);
                bail!("NFC service rejected pausePolling");
            }
            Ok(())
        }

        fn resume_polling(&self) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Resume);
            Ok(())
        }
    }

    /// Fails the first `failures` resolutions.
    struct FlakyProvider {
        adapter: Arc<FakeAdapter>,
        failures: AtomicUsize,
    }

    impl NfcAdapterProvider for FlakyProvider {
        fn default_adapter(&self) -> Result<Arc<dyn NfcAdapter>> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                bail!("NFC service not ready");
            }
            Ok(self.adapter.clone())
        }
    }

    fn new_task(adapter: Arc<FakeAdapter>, failures: usize) -> NfcCameraTask {
        let (_tx, rx) = mpsc::unbounded_channel();
        let provider = Arc::new(FlakyProvider { adapter, failures: AtomicUsize::new(failures) });
        NfcCameraTask::new(rx, provider, NfcCameraConfig::default())
    }

    fn opened(camera_id: &str, package_id: &str) -> CameraServiceEvent {
        CameraServiceEvent::CameraOpened {
            camera_id: camera_id.to_string(),
            package_id: package_id.to_string(),
        }
    }

    fn closed(camera_id: &str) -> CameraServiceEvent {
        CameraServiceEvent::CameraClosed { camera_id: camera_id.to_string() }
    }

    #[tokio::test]
    async fn open_pauses_and_arms_reassertion() {
        let adapter = FakeAdapter::new(true);
        let mut task = new_task(adapter.clone(), 0);

        let before = Instant::now();
        assert!(task.handle_service_event(opened("1", "com.evil.app")));

        assert_eq!(adapter.take_calls(), vec![Call::Pause(Duration::from_millis(40_000))]);
        assert_eq!(task.polling_state, PollingState::Pausing);
        let deadline = task.reassertion_deadline.expect("re-assertion should be armed");
        assert!(deadline - before > Duration::from_millis(40_000));
    }

    #[tokio::test]
    async fn close_resumes_and_cancels_reassertion() {
        let adapter = FakeAdapter::new(true);
        let mut task = new_task(adapter.clone(), 0);

        task.handle_service_event(opened("1", "com.evil.app"));
        task.handle_service_event(closed("1"));

        assert_eq!(
            adapter.take_calls(),
            vec![Call::Pause(Duration::from_millis(40_000)), Call::Resume]
        );
        assert_eq!(
            task.status(),
            PollingStatus {
                camera_in_use: false,
                polling_state: PollingState::Idle,
                reassertion_pending: false
            }
        );
    }

    #[tokio::test]
    async fn repeated_events_are_no_ops() {
        let adapter = FakeAdapter::new(true);
        let mut task = new_task(adapter.clone(), 0);

        task.handle_service_event(closed("1"));
        task.handle_service_event(opened("1", "com.evil.app"));
        task.handle_service_event(opened("1", "com.other.app"));
        task.handle_service_event(closed("1"));
        task.handle_service_event(closed("1"));

        assert_eq!(
            adapter.take_calls(),
            vec![Call::Pause(Duration::from_millis(40_000)), Call::Resume]
        );
    }

    #[tokio::test]
    async fn ignores_exempt_packages_and_other_cameras() {
        let adapter = FakeAdapter::new(true);
        let mut task = new_task(adapter.clone(), 0);

        task.handle_service_event(opened("1", "co.aospa.sense"));
        task.handle_service_event(opened("0", "com.evil.app"));
        task.handle_service_event(closed("0"));

        assert!(!task.camera_in_use);
        assert!(adapter.take_calls().is_empty());
    }

    #[tokio::test]
    async fn disabled_adapter_gets_no_requests() {
        let adapter = FakeAdapter::new(false);
        let mut task = new_task(adapter.clone(), 0);

        task.handle_service_event(opened("1", "com.evil.app"));
        assert!(task.camera_in_use);
        assert_eq!(task.polling_state, PollingState::Idle);
        assert!(task.reassertion_deadline.is_none());

        task.handle_service_event(closed("1"));
        assert!(adapter.take_calls().is_empty());
    }

    #[tokio::test]
    async fn timeout_reasserts_only_while_enabled() {
        let adapter = FakeAdapter::new(true);
        let mut task = new_task(adapter.clone(), 0);

        task.handle_service_event(opened("1", "com.evil.app"));
        task.handle_reassertion_timeout();
        assert_eq!(
            adapter.take_calls(),
            vec![
                Call::Pause(Duration::from_millis(40_000)),
                Call::Pause(Duration::from_millis(40_000))
            ]
        );
        assert!(task.reassertion_deadline.is_some());

        adapter.enabled.store(false, Ordering::SeqCst);
        task.handle_reassertion_timeout();
        assert!(adapter.take_calls().is_empty());
        assert_eq!(task.polling_state, PollingState::Idle);
        assert!(task.reassertion_deadline.is_none());
    }

    #[tokio::test]
    async fn stale_timeout_after_release_never_pauses() {
        let adapter = FakeAdapter::new(true);
        let mut task = new_task(adapter.clone(), 0);

        task.handle_service_event(opened("1", "com.evil.app"));
        // A close while disabled leaves the slot armed.
        adapter.enabled.store(false, Ordering::SeqCst);
        task.handle_service_event(closed("1"));
        assert!(task.reassertion_deadline.is_some());

        adapter.enabled.store(true, Ordering::SeqCst);
        task.handle_reassertion_timeout();

        assert_eq!(adapter.take_calls(), vec![Call::Pause(Duration::from_millis(40_000))]);
        assert!(task.reassertion_deadline.is_none());
        assert_eq!(task.polling_state, PollingState::Idle);
    }

    #[tokio::test]
    async fn failed_pause_is_retried_at_deadline() {
        let adapter = FakeAdapter::new(true);
        adapter.pause_failures.store(1, Ordering::SeqCst);
        let mut task = new_task(adapter.clone(), 0);

        task.handle_service_event(opened("1", "com.evil.app"));
        assert!(task.reassertion_deadline.is_some());
        assert_eq!(task.polling_state, PollingState::Pausing);

        task.handle_reassertion_timeout();
        assert_eq!(
            adapter.take_calls(),
            vec![
                Call::Pause(Duration::from_millis(40_000)),
                Call::Pause(Duration::from_millis(40_000))
            ]
        );
        assert!(task.reassertion_deadline.is_some());
    }

    #[tokio::test]
    async fn adapter_resolution_is_retried_and_cached() {
        let adapter = FakeAdapter::new(true);
        let mut task = new_task(adapter.clone(), 1);

        task.handle_service_event(opened("1", "com.evil.app"));
        assert!(task.camera_in_use);
        assert!(task.adapter.is_none());
        assert!(adapter.take_calls().is_empty());

        task.handle_service_event(closed("1"));
        assert!(task.adapter.is_some());
        assert_eq!(adapter.take_calls(), vec![Call::Resume]);
    }

    #[tokio::test]
    async fn stop_cancels_reassertion() {
        let adapter = FakeAdapter::new(true);
        let mut task = new_task(adapter.clone(), 0);

        task.handle_service_event(opened("1", "com.evil.app"));
        assert!(task.handle_service_event(CameraServiceEvent::Stop));

        assert!(!task.camera_in_use);
        assert!(task.reassertion_deadline.is_none());
        assert_eq!(task.polling_state, PollingState::Idle);
        assert!(!task.handle_service_event(CameraServiceEvent::Shutdown));
    }

    struct UnregisterFailingSource;

    impl CameraAvailabilitySource for UnregisterFailingSource {
        fn register_availability_callback(
            &self,
            _callback: Arc<dyn CameraAvailabilityCallback>,
        ) -> Result<()> {
            Ok(())
        }

        fn unregister_availability_callback(&self) -> Result<()> {
            bail!("camera service died");
        }
    }

    #[tokio::test]
    async fn stop_survives_unregister_failure() {
        let adapter = FakeAdapter::new(true);
        let provider =
            Arc::new(FlakyProvider { adapter: adapter.clone(), failures: AtomicUsize::new(0) });
        let mut coordinator = NfcCameraCoordinator::new(
            NfcCameraConfig::default(),
            Arc::new(UnregisterFailingSource),
            provider,
        )
        .unwrap();
        coordinator.start().unwrap();
        coordinator.on_camera_opened("1", "com.evil.app");

        coordinator.stop();
        assert!(!coordinator.registered);

        let status = coordinator.status().await.unwrap();
        assert!(!status.camera_in_use);
        assert!(!status.reassertion_pending);
        assert_eq!(adapter.take_calls(), vec![Call::Pause(Duration::from_millis(40_000))]);
    }
}
