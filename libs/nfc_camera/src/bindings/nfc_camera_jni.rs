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

//! # NFC camera policy java bindings
use anyhow::{anyhow, bail, Context, Result};
use jni::objects::{GlobalRef, JObject, JString, JValue};
use jni::sys::{jboolean, JNI_FALSE, JNI_TRUE};
use jni::{JNIEnv, JavaVM};
use log::{error, info, trace};
use nfc_camera_policies::camera_source::ForwardingCameraSource;
use nfc_camera_policies::common::{NfcAdapter, NfcAdapterProvider};
use nfc_camera_policies::config::NfcCameraConfig;
use nfc_camera_policies::policy_engine::NfcCameraEngine;
use nfc_camera_policies::service_host::{HostEnvironment, StartDecision};
use std::cell::RefCell;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use std::time::Duration;

const LOG_TAG: &str = "NfcCameraPolicy";

// Camera notifications from the Java side are forwarded through this source.
static CAMERA_SOURCE: LazyLock<Arc<ForwardingCameraSource>> =
    LazyLock::new(|| Arc::new(ForwardingCameraSource::new()));

// The running engine, if started.
static ENGINE: Mutex<Option<NfcCameraEngine>> = Mutex::new(None);

#[cfg(target_os = "android")]
fn init_logger() {
    android_logger::init_once(
        android_logger::Config::default()
            .with_tag(LOG_TAG)
            .with_max_level(log::LevelFilter::Info),
    );
}

#[cfg(not(target_os = "android"))]
fn init_logger() {
    let _ = env_logger::try_init();
    trace!("Logging initialized for {}", LOG_TAG);
}

/// Describes and clears a pending Java exception so later JNI calls stay valid.
fn clear_pending_exception(env: &mut JNIEnv) {
    if env.exception_check().unwrap_or(false) {
        let _ = env.exception_describe();
        let _ = env.exception_clear();
    }
}

/// Runs `f` on a JNIEnv attached to the current thread, clearing any Java exception
/// it leaves behind.
fn with_attached_env<R>(vm: &JavaVM, f: impl FnOnce(&mut JNIEnv) -> Result<R>) -> Result<R> {
    let mut env = vm.attach_current_thread().context("Failed to attach thread to the JVM")?;
    let result = f(&mut *env);
    if result.is_err() {
        clear_pending_exception(&mut *env);
    }
    result
}

/// `android.nfc.NfcAdapter` reached through JNI.
struct JniNfcAdapter {
    vm: JavaVM,
    adapter: GlobalRef,
}

impl NfcAdapter for JniNfcAdapter {
    fn is_enabled(&self) -> bool {
        let enabled = with_attached_env(&self.vm, |env| {
            Ok(env.call_method(&self.adapter, "isEnabled", "()Z", &[])?.z()?)
        });
        enabled.unwrap_or_else(|e| {
            error!("NfcAdapter.isEnabled failed: {:#}", e);
            false
        })
    }

    fn pause_polling(&self, max_duration: Duration) -> Result<()> {
        let timeout_ms = i32::try_from(max_duration.as_millis())
            .map_err(|_| anyhow!("Pause timeout {:?} out of range", max_duration))?;
        with_attached_env(&self.vm, |env| {
            env.call_method(&self.adapter, "pausePolling", "(I)V", &[JValue::Int(timeout_ms)])?
                .v()?;
            Ok(())
        })
        .context("NfcAdapter.pausePolling failed")
    }

    fn resume_polling(&self) -> Result<()> {
        with_attached_env(&self.vm, |env| {
            env.call_method(&self.adapter, "resumePolling", "()V", &[])?.v()?;
            Ok(())
        })
        .context("NfcAdapter.resumePolling failed")
    }
}

/// Resolves the adapter with `NfcAdapter.getDefaultAdapter(context)`.
struct JniNfcAdapterProvider {
    vm: JavaVM,
    context: GlobalRef,
}

impl NfcAdapterProvider for JniNfcAdapterProvider {
    fn default_adapter(&self) -> Result<Arc<dyn NfcAdapter>> {
        let (vm, adapter) = with_attached_env(&self.vm, |env| {
            let adapter = env
                .call_static_method(
                    "android/nfc/NfcAdapter",
                    "getDefaultAdapter",
                    "(Landroid/content/Context;)Landroid/nfc/NfcAdapter;",
                    &[JValue::Object(self.context.as_obj())],
                )?
                .l()?;
            if adapter.is_null() {
                bail!("NfcAdapter.getDefaultAdapter returned null");
            }
            Ok((env.get_java_vm()?, env.new_global_ref(adapter)?))
        })?;
        Ok(Arc::new(JniNfcAdapter { vm, adapter }))
    }
}

/// Host environment backed by the package manager and system properties.
struct JniHostEnvironment<'a, 'local> {
    env: RefCell<&'a mut JNIEnv<'local>>,
    context: &'a JObject<'local>,
}

impl JniHostEnvironment<'_, '_> {
    fn query_feature(&self, name: &str) -> Result<bool> {
        let mut env = self.env.borrow_mut();
        let package_manager = env
            .call_method(
                self.context,
                "getPackageManager",
                "()Landroid/content/pm/PackageManager;",
                &[],
            )?
            .l()?;
        let feature = env.new_string(name)?;
        Ok(env
            .call_method(
                &package_manager,
                "hasSystemFeature",
                "(Ljava/lang/String;)Z",
                &[(&feature).into()],
            )?
            .z()?)
    }

    fn query_bool_property(&self, key: &str, default: bool) -> Result<bool> {
        let mut env = self.env.borrow_mut();
        let key = env.new_string(key)?;
        Ok(env
            .call_static_method(
                "android/os/SystemProperties",
                "getBoolean",
                "(Ljava/lang/String;Z)Z",
                &[(&key).into(), JValue::Bool(if default { JNI_TRUE } else { JNI_FALSE })],
            )?
            .z()?)
    }

    fn clear_exception(&self) {
        let mut env = self.env.borrow_mut();
        clear_pending_exception(&mut **env);
    }
}

impl HostEnvironment for JniHostEnvironment<'_, '_> {
    fn has_system_feature(&self, name: &str) -> bool {
        self.query_feature(name).unwrap_or_else(|e| {
            error!("hasSystemFeature({}) failed: {:#}", name, e);
            self.clear_exception();
            false
        })
    }

    fn get_bool_property(&self, key: &str, default: bool) -> bool {
        self.query_bool_property(key, default).unwrap_or_else(|e| {
            error!("SystemProperties.getBoolean({}) failed: {:#}", key, e);
            self.clear_exception();
            default
        })
    }
}

fn create_engine(env: &mut JNIEnv, context: &JObject) -> Result<NfcCameraEngine> {
    let provider = JniNfcAdapterProvider {
        vm: env.get_java_vm()?,
        context: env.new_global_ref(context)?,
    };
    let camera_source = CAMERA_SOURCE.clone();
    NfcCameraEngine::new(NfcCameraConfig::default(), camera_source, Arc::new(provider))
}

fn read_string(env: &mut JNIEnv, value: &JString) -> Option<String> {
    match env.get_string(value) {
        Ok(value) => Some(value.into()),
        Err(e) => {
            error!("Failed to read java string: {}", e);
            clear_pending_exception(env);
            None
        }
    }
}

/// Returns true if the policy should run on this device.
#[no_mangle]
pub extern "system" fn Java_com_android_server_nfc_NfcCameraManager_nativeShouldStart<'a>(
    mut env: JNIEnv<'a>,
    _obj: JObject<'a>,
    context: JObject<'a>,
) -> jboolean {
    init_logger();
    let host = JniHostEnvironment { env: RefCell::new(&mut env), context: &context };
    if StartDecision::evaluate(&host).should_start() {
        JNI_TRUE
    } else {
        JNI_FALSE
    }
}

/// Creates the policy engine and registers it for camera availability.
#[no_mangle]
pub extern "system" fn Java_com_android_server_nfc_NfcCameraManager_nativeStart<'a>(
    mut env: JNIEnv<'a>,
    _obj: JObject<'a>,
    context: JObject<'a>,
) {
    init_logger();
    let mut engine_slot = ENGINE.lock().unwrap_or_else(PoisonError::into_inner);
    if engine_slot.is_some() {
        error!("nativeStart called while already running, ignoring");
        return;
    }

    let mut engine = match create_engine(&mut env, &context) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to create NfcCameraEngine: {:#}", e);
            clear_pending_exception(&mut env);
            return;
        }
    };
    if let Err(e) = engine.start() {
        error!("Failed to start NfcCameraEngine: {:#}", e);
        return;
    }
    *engine_slot = Some(engine);
    info!("NFC camera polling policy started");
}

/// Stops and releases the policy engine.
#[no_mangle]
pub extern "system" fn Java_com_android_server_nfc_NfcCameraManager_nativeStop<'a>(
    _env: JNIEnv<'a>,
    _obj: JObject<'a>,
) {
    trace!("nativeStop");
    let engine = ENGINE.lock().unwrap_or_else(PoisonError::into_inner).take();
    match engine {
        Some(mut engine) => {
            engine.stop();
            info!("NFC camera polling policy stopped");
        }
        None => trace!("nativeStop: not running"),
    }
}

/// Forwards a camera open notification.
#[no_mangle]
pub extern "system" fn Java_com_android_server_nfc_NfcCameraManager_nativeOnCameraOpened<'a>(
    mut env: JNIEnv<'a>,
    _obj: JObject<'a>,
    camera_id: JString<'a>,
    package_id: JString<'a>,
) {
    let Some(camera_id) = read_string(&mut env, &camera_id) else { return };
    let Some(package_id) = read_string(&mut env, &package_id) else { return };
    trace!("nativeOnCameraOpened with {} {}", camera_id, package_id);
    CAMERA_SOURCE.notify_opened(&camera_id, &package_id);
}

/// Forwards a camera close notification.
#[no_mangle]
pub extern "system" fn Java_com_android_server_nfc_NfcCameraManager_nativeOnCameraClosed<'a>(
    mut env: JNIEnv<'a>,
    _obj: JObject<'a>,
    camera_id: JString<'a>,
) {
    let Some(camera_id) = read_string(&mut env, &camera_id) else { return };
    trace!("nativeOnCameraClosed with {}", camera_id);
    CAMERA_SOURCE.notify_closed(&camera_id);
}
