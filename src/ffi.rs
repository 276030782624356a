//! C FFI layer for hmd-bridge.
//!
//! The host supplies the tracking client and the message handler as
//! function-pointer tables and drives an opaque session handle. The generated
//! C header is written to `include/hmd_bridge.h` by cbindgen.

use crate::client::{AnalogCallback, DigitalCallback, InterfaceHandle, TrackingClient};
use crate::config::BridgeConfig;
use crate::dispatch::MessageHandler;
use crate::error::LastError;
use crate::keys::ControllerKey;
use crate::provider::{PoseProvider, StereoConfigProvider};
use crate::session::Session;
use crate::types::{ClientStatus, Hand, Pose, PoseSample};
use crate::{BridgeError, Result};
use std::collections::HashMap;
use std::ffi::{c_char, c_int, c_void, CString};
use std::sync::{Arc, Mutex, OnceLock};

/// Last error message for C consumers.
static LAST_ERROR: LastError = LastError::new();

/// Status code returned by every table function on success.
pub const HB_OK: c_int = 0;

/// Opaque session handle for C consumers.
pub struct HbSession(Session);

/// Engine-space pose in C-compatible layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HbPose {
    /// Quaternion [qx, qy, qz, qw].
    pub orientation: [f32; 4],
    /// Position [x, y, z] in world units.
    pub position: [f32; 3],
}

impl From<Pose> for HbPose {
    fn from(pose: Pose) -> Self {
        HbPose {
            orientation: pose.orientation.to_array(),
            position: pose.position.to_array(),
        }
    }
}

/// Raw tracker pose filled in by `HbClientVTable::get_pose`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct HbPoseSample {
    /// Translation [x, y, z] in meters.
    pub translation: [f64; 3],
    /// Quaternion [qx, qy, qz, qw].
    pub rotation: [f64; 4],
    /// Client timestamp in microseconds.
    pub timestamp_us: u64,
}

impl From<HbPoseSample> for PoseSample {
    fn from(s: HbPoseSample) -> Self {
        PoseSample {
            translation: s.translation,
            rotation: s.rotation,
            timestamp_us: s.timestamp_us,
        }
    }
}

/// Button report: `pressed` is true on press, false on release.
pub type HbDigitalFn = extern "C" fn(cb_userdata: *mut c_void, pressed: bool);

/// Analog report.
pub type HbAnalogFn = extern "C" fn(cb_userdata: *mut c_void, value: f64);

/// Tracking client supplied by the host.
///
/// Every function returns `HB_OK` on success. `check_status` returns `HB_OK`
/// when the client context is ready. Functions may be called from any thread,
/// and callbacks may be invoked from any thread until `release_interface`
/// returns for their handle.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HbClientVTable {
    pub userdata: *mut c_void,
    pub check_status: extern "C" fn(userdata: *mut c_void) -> c_int,
    pub update: extern "C" fn(userdata: *mut c_void) -> c_int,
    pub resolve_interface:
        extern "C" fn(userdata: *mut c_void, path: *const c_char, out_handle: *mut u64) -> c_int,
    pub release_interface: extern "C" fn(userdata: *mut c_void, handle: u64) -> c_int,
    pub register_digital_callback: extern "C" fn(
        userdata: *mut c_void,
        handle: u64,
        callback: HbDigitalFn,
        cb_userdata: *mut c_void,
    ) -> c_int,
    pub register_analog_callback: extern "C" fn(
        userdata: *mut c_void,
        handle: u64,
        callback: HbAnalogFn,
        cb_userdata: *mut c_void,
    ) -> c_int,
    pub get_pose: extern "C" fn(userdata: *mut c_void, handle: u64, out: *mut HbPoseSample) -> c_int,
}

/// Engine input sink supplied by the host. `key` is a `ControllerKey` code,
/// see `hb_key_name`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HbMessageHandlerVTable {
    pub userdata: *mut c_void,
    pub on_button_pressed:
        extern "C" fn(userdata: *mut c_void, key: u32, controller_id: c_int, is_repeat: bool),
    pub on_button_released:
        extern "C" fn(userdata: *mut c_void, key: u32, controller_id: c_int, is_repeat: bool),
    pub on_analog: extern "C" fn(userdata: *mut c_void, key: u32, controller_id: c_int, value: f32),
}

/// Callback box kept alive for as long as its handle is registered.
type Registered = Box<dyn std::any::Any + Send + Sync>;

extern "C" fn digital_trampoline(cb_userdata: *mut c_void, pressed: bool) {
    if cb_userdata.is_null() {
        return;
    }
    let callback = unsafe { &*(cb_userdata as *const DigitalCallback) };
    callback(pressed);
}

extern "C" fn analog_trampoline(cb_userdata: *mut c_void, value: f64) {
    if cb_userdata.is_null() {
        return;
    }
    let callback = unsafe { &*(cb_userdata as *const AnalogCallback) };
    callback(value);
}

/// `TrackingClient` backed by a host vtable.
struct FfiClient {
    vtable: HbClientVTable,
    callbacks: Mutex<HashMap<u64, Vec<Registered>>>,
}

// The host guarantees the table may be used from any thread.
unsafe impl Send for FfiClient {}
unsafe impl Sync for FfiClient {}

impl FfiClient {
    fn new(vtable: HbClientVTable) -> Self {
        FfiClient {
            vtable,
            callbacks: Mutex::new(HashMap::new()),
        }
    }

    fn keep(&self, handle: InterfaceHandle, registered: Registered) {
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.entry(handle.0).or_default().push(registered);
        }
    }
}

impl TrackingClient for FfiClient {
    fn check_status(&self) -> ClientStatus {
        if (self.vtable.check_status)(self.vtable.userdata) == HB_OK {
            ClientStatus::Ready
        } else {
            ClientStatus::NotReady
        }
    }

    fn update(&self) -> Result<()> {
        match (self.vtable.update)(self.vtable.userdata) {
            HB_OK => Ok(()),
            code => Err(BridgeError::Pump(format!("client update returned {}", code))),
        }
    }

    fn resolve_interface(&self, path: &str) -> Result<InterfaceHandle> {
        let c_path = CString::new(path)
            .map_err(|_| BridgeError::InvalidArgument("interface path contains NUL"))?;
        let mut handle = 0u64;
        match (self.vtable.resolve_interface)(self.vtable.userdata, c_path.as_ptr(), &mut handle) {
            HB_OK => Ok(InterfaceHandle(handle)),
            _ => Err(BridgeError::Resolution(path.to_string())),
        }
    }

    fn release_interface(&self, handle: InterfaceHandle) -> Result<()> {
        if (self.vtable.release_interface)(self.vtable.userdata, handle.0) != HB_OK {
            // Still registered, so its callbacks stay alive.
            return Err(BridgeError::InvalidArgument("client rejected interface release"));
        }
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.remove(&handle.0);
        }
        Ok(())
    }

    fn register_digital_callback(
        &self,
        handle: InterfaceHandle,
        callback: DigitalCallback,
    ) -> Result<()> {
        let boxed = Box::new(callback);
        let cb_userdata = &*boxed as *const DigitalCallback as *mut c_void;
        let code = (self.vtable.register_digital_callback)(
            self.vtable.userdata,
            handle.0,
            digital_trampoline,
            cb_userdata,
        );
        if code != HB_OK {
            return Err(BridgeError::CallbackRegistration(format!("interface {}", handle.0)));
        }
        self.keep(handle, boxed);
        Ok(())
    }

    fn register_analog_callback(
        &self,
        handle: InterfaceHandle,
        callback: AnalogCallback,
    ) -> Result<()> {
        let boxed = Box::new(callback);
        let cb_userdata = &*boxed as *const AnalogCallback as *mut c_void;
        let code = (self.vtable.register_analog_callback)(
            self.vtable.userdata,
            handle.0,
            analog_trampoline,
            cb_userdata,
        );
        if code != HB_OK {
            return Err(BridgeError::CallbackRegistration(format!("interface {}", handle.0)));
        }
        self.keep(handle, boxed);
        Ok(())
    }

    fn pose(&self, handle: InterfaceHandle) -> Result<PoseSample> {
        let mut out = HbPoseSample::default();
        match (self.vtable.get_pose)(self.vtable.userdata, handle.0, &mut out) {
            HB_OK => Ok(out.into()),
            _ => Err(BridgeError::QueryFailure(format!("interface {}", handle.0))),
        }
    }
}

/// `MessageHandler` backed by a host vtable.
struct FfiHandler(HbMessageHandlerVTable);

// Only ever called from the thread driving the session.
unsafe impl Send for FfiHandler {}

impl MessageHandler for FfiHandler {
    fn on_controller_button_pressed(&mut self, key: ControllerKey, controller_id: i32, is_repeat: bool) {
        (self.0.on_button_pressed)(self.0.userdata, key.code(), controller_id, is_repeat);
    }

    fn on_controller_button_released(&mut self, key: ControllerKey, controller_id: i32, is_repeat: bool) {
        (self.0.on_button_released)(self.0.userdata, key.code(), controller_id, is_repeat);
    }

    fn on_controller_analog(&mut self, key: ControllerKey, controller_id: i32, value: f32) {
        (self.0.on_analog)(self.0.userdata, key.code(), controller_id, value);
    }
}

/// Create a session on a host-supplied tracking client.
///
/// Configuration is read from `HMD_BRIDGE_*` environment variables. A client
/// whose context is not ready still yields a session, with inert input.
/// Returns NULL on error (check hb_last_error()).
///
/// # Safety
/// `client` and `handler` must point to valid tables, or be null. The tables
/// are copied; their userdata must stay valid until `hb_session_destroy`.
#[no_mangle]
pub unsafe extern "C" fn hb_session_create(
    client: *const HbClientVTable,
    handler: *const HbMessageHandlerVTable,
) -> *mut HbSession {
    if client.is_null() || handler.is_null() {
        LAST_ERROR.set(&BridgeError::InvalidArgument("null vtable"));
        return std::ptr::null_mut();
    }
    let client: Arc<dyn TrackingClient> = Arc::new(FfiClient::new(*client));
    let handler = Box::new(FfiHandler(*handler));

    match Session::connect(client, handler, &BridgeConfig::from_env()) {
        Ok(session) => {
            LAST_ERROR.clear();
            Box::into_raw(Box::new(HbSession(session)))
        }
        Err(e) => {
            LAST_ERROR.set(&e);
            std::ptr::null_mut()
        }
    }
}

/// Shut down a session, release every interface and free it.
///
/// # Safety
/// `session` must be a pointer returned by `hb_session_create`, or null.
#[no_mangle]
pub unsafe extern "C" fn hb_session_destroy(session: *mut HbSession) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Run one frame: deliver controller events to the handler and write the
/// head pose to `out`. Returns 0 if the head pose is fresh, 1 if the last
/// pose was kept, -1 on error.
///
/// # Safety
/// `session` and `out` must be valid pointers, or null.
#[no_mangle]
pub unsafe extern "C" fn hb_session_begin_frame(
    session: *mut HbSession,
    delta_time: f32,
    out: *mut HbPose,
) -> c_int {
    if session.is_null() || out.is_null() {
        LAST_ERROR.set(&BridgeError::InvalidArgument("null pointer"));
        return -1;
    }
    let session = &mut *session;
    let pose = session.0.begin_frame(delta_time);
    out.write(pose.into());
    if session.0.is_head_pose_fresh() {
        0
    } else {
        1
    }
}

/// Write one controller pose to `out`. `hand`: 0 = left, 1 = right.
/// Returns 0 on success, -1 if the controller is not tracked.
///
/// # Safety
/// `session` and `out` must be valid pointers, or null.
#[no_mangle]
pub unsafe extern "C" fn hb_session_controller_pose(
    session: *const HbSession,
    controller_index: c_int,
    hand: c_int,
    out: *mut HbPose,
) -> c_int {
    if session.is_null() || out.is_null() {
        LAST_ERROR.set(&BridgeError::InvalidArgument("null pointer"));
        return -1;
    }
    let hand = match hand {
        0 => Hand::Left,
        1 => Hand::Right,
        _ => {
            LAST_ERROR.set(&BridgeError::InvalidArgument("hand must be 0 or 1"));
            return -1;
        }
    };
    let session = &*session;
    match session.0.controller_pose(controller_index, hand) {
        Some(pose) => {
            out.write(pose.into());
            0
        }
        None => {
            LAST_ERROR.set(&BridgeError::Untracked);
            -1
        }
    }
}

/// Make the current yaw, offset by `yaw` degrees, the forward direction.
///
/// # Safety
/// `session` must be a valid session pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn hb_session_reset_orientation(session: *mut HbSession, yaw: f32) {
    if let Some(session) = session.as_mut() {
        session.0.hmd_mut().reset_orientation(yaw);
    }
}

/// Make the current head position the origin.
///
/// # Safety
/// `session` must be a valid session pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn hb_session_reset_position(session: *mut HbSession) {
    if let Some(session) = session.as_mut() {
        session.0.hmd_mut().reset_position();
    }
}

/// # Safety
/// `session` must be a valid session pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn hb_session_reset_orientation_and_position(session: *mut HbSession, yaw: f32) {
    if let Some(session) = session.as_mut() {
        session.0.hmd_mut().reset_orientation_and_position(yaw);
    }
}

/// Make the full current head orientation and position the new base.
///
/// # Safety
/// `session` must be a valid session pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn hb_session_set_current_as_base(session: *mut HbSession) {
    if let Some(session) = session.as_mut() {
        session.0.hmd_mut().set_current_as_base();
    }
}

/// Returns the resulting stereo state.
///
/// # Safety
/// `session` must be a valid session pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn hb_session_enable_stereo(session: *mut HbSession, stereo: bool) -> bool {
    match session.as_mut() {
        Some(session) => session.0.hmd_mut().enable_stereo(stereo),
        None => false,
    }
}

/// Returns the resulting positional tracking state.
///
/// # Safety
/// `session` must be a valid session pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn hb_session_enable_positional_tracking(
    session: *mut HbSession,
    enable: bool,
) -> bool {
    match session.as_mut() {
        Some(session) => session.0.hmd_mut().enable_positional_tracking(enable),
        None => false,
    }
}

/// # Safety
/// `session` must be a valid session pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn hb_session_enable_low_persistence(session: *mut HbSession, enable: bool) {
    if let Some(session) = session.as_mut() {
        session.0.hmd_mut().enable_low_persistence_mode(enable);
    }
}

/// Name of a controller key code, as a static null-terminated string.
/// Returns NULL for unknown codes.
#[no_mangle]
pub extern "C" fn hb_key_name(key: u32) -> *const c_char {
    static NAMES: OnceLock<HashMap<u32, CString>> = OnceLock::new();
    let names = NAMES.get_or_init(|| {
        ControllerKey::ALL
            .iter()
            .filter_map(|k| CString::new(k.name()).ok().map(|name| (k.code(), name)))
            .collect()
    });
    names
        .get(&key)
        .map_or(std::ptr::null(), |name| name.as_ptr())
}

/// Get the last error message raised on the calling thread. Returns NULL if
/// no error. The returned pointer is valid until the next hmd-bridge API
/// call on the same thread.
#[no_mangle]
pub extern "C" fn hb_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedClient;
    use std::ffi::CStr;

    // Host-side table that forwards to a SimulatedClient.

    struct HostPtr(*mut c_void);
    unsafe impl Send for HostPtr {}
    unsafe impl Sync for HostPtr {}

    impl HostPtr {
        fn get(&self) -> *mut c_void {
            self.0
        }
    }

    fn sim(userdata: *mut c_void) -> &'static SimulatedClient {
        unsafe { &*(userdata as *const SimulatedClient) }
    }

    fn code(result: Result<()>) -> c_int {
        if result.is_ok() {
            HB_OK
        } else {
            -1
        }
    }

    extern "C" fn host_check_status(ud: *mut c_void) -> c_int {
        if sim(ud).is_ready() {
            HB_OK
        } else {
            1
        }
    }

    extern "C" fn host_update(ud: *mut c_void) -> c_int {
        code(sim(ud).update())
    }

    extern "C" fn host_resolve(ud: *mut c_void, path: *const c_char, out: *mut u64) -> c_int {
        let path = unsafe { CStr::from_ptr(path) }.to_string_lossy();
        match sim(ud).resolve_interface(&path) {
            Ok(handle) => {
                unsafe { out.write(handle.0) };
                HB_OK
            }
            Err(_) => -1,
        }
    }

    extern "C" fn host_release(ud: *mut c_void, handle: u64) -> c_int {
        code(sim(ud).release_interface(InterfaceHandle(handle)))
    }

    extern "C" fn host_register_digital(
        ud: *mut c_void,
        handle: u64,
        cb: HbDigitalFn,
        cb_ud: *mut c_void,
    ) -> c_int {
        let cb_ud = HostPtr(cb_ud);
        code(sim(ud).register_digital_callback(
            InterfaceHandle(handle),
            Box::new(move |pressed| cb(cb_ud.get(), pressed)),
        ))
    }

    extern "C" fn host_register_analog(
        ud: *mut c_void,
        handle: u64,
        cb: HbAnalogFn,
        cb_ud: *mut c_void,
    ) -> c_int {
        let cb_ud = HostPtr(cb_ud);
        code(sim(ud).register_analog_callback(
            InterfaceHandle(handle),
            Box::new(move |value| cb(cb_ud.get(), value)),
        ))
    }

    extern "C" fn host_get_pose(ud: *mut c_void, handle: u64, out: *mut HbPoseSample) -> c_int {
        match sim(ud).pose(InterfaceHandle(handle)) {
            Ok(s) => {
                unsafe {
                    out.write(HbPoseSample {
                        translation: s.translation,
                        rotation: s.rotation,
                        timestamp_us: s.timestamp_us,
                    })
                };
                HB_OK
            }
            Err(_) => -1,
        }
    }

    fn client_vtable(sim: &Arc<SimulatedClient>) -> HbClientVTable {
        HbClientVTable {
            userdata: Arc::as_ptr(sim) as *mut c_void,
            check_status: host_check_status,
            update: host_update,
            resolve_interface: host_resolve,
            release_interface: host_release,
            register_digital_callback: host_register_digital,
            register_analog_callback: host_register_analog,
            get_pose: host_get_pose,
        }
    }

    type Recorded = Vec<(char, u32)>;

    fn recorded(ud: *mut c_void) -> &'static mut Recorded {
        unsafe { &mut *(ud as *mut Recorded) }
    }

    extern "C" fn on_pressed(ud: *mut c_void, key: u32, _id: c_int, _repeat: bool) {
        recorded(ud).push(('p', key));
    }

    extern "C" fn on_released(ud: *mut c_void, key: u32, _id: c_int, _repeat: bool) {
        recorded(ud).push(('r', key));
    }

    extern "C" fn on_analog(ud: *mut c_void, key: u32, _id: c_int, _value: f32) {
        recorded(ud).push(('a', key));
    }

    fn handler_vtable(events: &mut Recorded) -> HbMessageHandlerVTable {
        HbMessageHandlerVTable {
            userdata: events as *mut Recorded as *mut c_void,
            on_button_pressed: on_pressed,
            on_button_released: on_released,
            on_analog,
        }
    }

    #[test]
    fn session_over_host_tables() {
        let sim = Arc::new(SimulatedClient::new());
        let mut events: Recorded = Vec::new();
        let client = client_vtable(&sim);
        let handler = handler_vtable(&mut events);

        unsafe {
            let session = hb_session_create(&client, &handler);
            assert!(!session.is_null());

            sim.set_pose("/me/head", PoseSample { translation: [0.0, 1.0, 0.0], ..PoseSample::IDENTITY });
            sim.report_button("/controller/left/1", true);
            sim.report_button("/controller/left/1", false);

            let mut pose = HbPose::from(Pose::IDENTITY);
            assert_eq!(hb_session_begin_frame(session, 0.011, &mut pose), 0);
            assert!((pose.position[2] - 100.0).abs() < 1e-3);

            sim.clear_pose("/me/head");
            assert_eq!(hb_session_begin_frame(session, 0.011, &mut pose), 1);
            assert!((pose.position[2] - 100.0).abs() < 1e-3);

            assert!(hb_session_enable_stereo(session, true));
            assert!(!hb_session_enable_positional_tracking(session, false));
            hb_session_reset_orientation_and_position(session, 0.0);

            let mut hand = pose;
            assert_eq!(hb_session_controller_pose(session, 0, 1, &mut hand), -1);
            assert_eq!(hb_session_controller_pose(session, 0, 7, &mut hand), -1);
            let msg = CStr::from_ptr(hb_last_error()).to_str().unwrap();
            assert!(msg.starts_with("Invalid argument"), "{}", msg);

            hb_session_destroy(session);

            // Null handles are rejected without touching anything.
            assert!(hb_session_create(std::ptr::null(), &handler).is_null());
            assert_eq!(hb_session_begin_frame(std::ptr::null_mut(), 0.0, &mut pose), -1);
            assert!(!hb_session_enable_stereo(std::ptr::null_mut(), true));
            hb_session_reset_position(std::ptr::null_mut());
            hb_session_destroy(std::ptr::null_mut());
        }

        let face = ControllerKey::LeftFaceButton1.code();
        let dpad = ControllerKey::GamepadDPadDown.code();
        assert_eq!(events, vec![('p', face), ('r', face), ('p', dpad), ('r', dpad)]);
        assert_eq!(sim.live_handles(), 0);
    }

    #[test]
    fn key_names_are_static_strings() {
        let name = hb_key_name(ControllerKey::RightTriggerAxis.code());
        let name = unsafe { CStr::from_ptr(name) }.to_str().unwrap();
        assert_eq!(name, ControllerKey::RightTriggerAxis.name());
        assert!(hb_key_name(u32::MAX).is_null());
    }
}
