use std::ffi::{c_char, c_int, c_uchar, c_uint, c_void, CStr};
use std::ptr::{self, NonNull};

use crate::{config::GPU_INDEX, error::HwError, gpu::Gpu};

const XNV_OK: c_int = 1;

/// `Gpu` talking to the driver via libXNVCtrl on the default X display.
/// The display connection is the control handle and is closed on drop.
pub struct XnvCtrl {
    display: NonNull<Display>,
}

impl XnvCtrl {
    pub fn open() -> Result<Self, HwError> {
        let display = unsafe { XOpenDisplay(ptr::null()) };
        NonNull::new(display)
            .map(|display| Self { display })
            .ok_or_else(|| HwError::Init("error connecting to x11 display".into()))
    }

    fn query_int(&self, target: CTRL_TARGET, id: u32, attr: CTRL_ATTR) -> Result<i32, String> {
        let mut value: c_int = -1;
        match unsafe {
            XNVCTRLQueryTargetAttribute(self.display.as_ptr(), target, id as c_int, 0, attr, &mut value)
        } {
            XNV_OK => Ok(value),
            i => Err(format!("XNVCtrl QueryAttr({:?}) failed; error {}", attr, i)),
        }
    }

    fn set_int(&self, target: CTRL_TARGET, id: u32, attr: CTRL_ATTR, value: i32) -> Result<(), String> {
        match unsafe {
            XNVCTRLSetTargetAttributeAndGetStatus(self.display.as_ptr(), target, id as c_int, 0, attr, value)
        } {
            XNV_OK => Ok(()),
            i => Err(format!("XNVCtrl SetAttr({:?}={}) failed; error {}", attr, value, i)),
        }
    }
}

impl Gpu for XnvCtrl {
    fn enable_manual_fan_control(&mut self) -> Result<(), HwError> {
        self.set_int(CTRL_TARGET::GPU, GPU_INDEX, CTRL_ATTR::COOLER_MANUAL_CONTROL, 1)
            .map_err(HwError::Init)
    }

    fn restore_auto_fan_control(&mut self) -> Result<(), HwError> {
        self.set_int(CTRL_TARGET::GPU, GPU_INDEX, CTRL_ATTR::COOLER_MANUAL_CONTROL, 0)
            .map_err(HwError::Actuation)
    }

    fn query_fan_count(&mut self) -> Result<u32, HwError> {
        let mut data: *mut c_uchar = ptr::null_mut();
        let mut len: c_int = 0;
        let status = unsafe {
            XNVCTRLQueryTargetBinaryData(
                self.display.as_ptr(),
                CTRL_TARGET::GPU,
                GPU_INDEX as c_int,
                0,
                CTRL_BINARY_ATTR::COOLERS_USED_BY_GPU,
                &mut data,
                &mut len,
            )
        };
        if status != XNV_OK || data.is_null() {
            return Err(HwError::Init(format!(
                "XNVCtrl QueryBinaryData(COOLERS_USED_BY_GPU) failed; error {}",
                status
            )));
        }

        // first int of the blob is the number of coolers
        let count = if len as usize >= std::mem::size_of::<c_int>() {
            unsafe { ptr::read_unaligned(data as *const c_int) }
        } else {
            0
        };
        unsafe { XFree(data as *mut c_void) };

        u32::try_from(count).map_err(|_| HwError::Init(format!("bogus cooler count {}", count)))
    }

    fn query_temperature(&mut self) -> Result<i32, HwError> {
        self.query_int(CTRL_TARGET::GPU, GPU_INDEX, CTRL_ATTR::CORE_TEMPERATURE)
            .map_err(HwError::Sensor)
    }

    fn query_fan_duty(&mut self, fan_index: u32) -> Result<i32, HwError> {
        self.query_int(CTRL_TARGET::COOLER, fan_index, CTRL_ATTR::THERMAL_COOLER_CURRENT_LEVEL)
            .map_err(HwError::Sensor)
    }

    fn query_utilization_text(&mut self) -> Result<String, HwError> {
        let mut raw: *mut c_char = ptr::null_mut();
        let status = unsafe {
            XNVCTRLQueryTargetStringAttribute(
                self.display.as_ptr(),
                CTRL_TARGET::GPU,
                GPU_INDEX as c_int,
                0,
                CTRL_STRING_ATTR::GPU_UTILIZATION,
                &mut raw,
            )
        };
        if status != XNV_OK || raw.is_null() {
            return Err(HwError::Sensor(format!(
                "XNVCtrl QueryStringAttr(GPU_UTILIZATION) failed; error {}",
                status
            )));
        }

        let text = unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned();
        unsafe { XFree(raw as *mut c_void) };
        Ok(text)
    }

    fn set_fan_duty(&mut self, fan_index: u32, duty_pct: u8) -> Result<(), HwError> {
        self.set_int(CTRL_TARGET::COOLER, fan_index, CTRL_ATTR::THERMAL_COOLER_LEVEL, duty_pct.into())
            .map_err(HwError::Actuation)
    }
}

impl Drop for XnvCtrl {
    fn drop(&mut self) {
        log::debug!("closing x11 display");
        unsafe { XCloseDisplay(self.display.as_ptr()) };
    }
}

// FFI related stuff

#[repr(C)]
struct Display {
    _private: [u8; 0],
}

/// XNVCtrl target
#[allow(dead_code)]
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy)]
#[repr(u32)]
enum CTRL_TARGET {
    X_SCREEN = 0,
    GPU = 1,
    FRAMELOCK = 2,
    VCSC = 3,
    GVI = 4,
    COOLER = 5,
    THERMAL_SENSOR = 6,
    _3D_VISION_PRO_TRANSCEIVER = 7,
    DISPLAY = 8,
}

/// XNVCtrl integer attribute (non exhaustive)
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy)]
#[repr(u32)]
enum CTRL_ATTR {
    CORE_TEMPERATURE = 60,
    COOLER_MANUAL_CONTROL = 319,
    THERMAL_COOLER_LEVEL = 320,
    THERMAL_COOLER_CURRENT_LEVEL = 417,
}

/// XNVCtrl string attribute (non exhaustive)
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy)]
#[repr(u32)]
enum CTRL_STRING_ATTR {
    GPU_UTILIZATION = 53,
}

/// XNVCtrl binary attribute (non exhaustive)
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy)]
#[repr(u32)]
enum CTRL_BINARY_ATTR {
    COOLERS_USED_BY_GPU = 10,
}

#[link(name = "X11")]
#[link(name = "Xext")]
#[link(name = "XNVCtrl")]
extern "C" {
    //https://github.com/foucault/nvfancontrol/blob/547dab69775fe7cd4ec7e9d91d28d549dcc9e13f/src/nvctrl/os/unix.rs#L74

    /// Opens a new X11 display with the specified name, null for `$DISPLAY`
    fn XOpenDisplay(name: *const c_char) -> *mut Display;

    fn XCloseDisplay(dpy: *mut Display) -> c_int;

    /// Frees memory handed out by Xlib/XNVCtrl
    fn XFree(data: *mut c_void) -> c_int;

    /// XNVCtrl int query with target
    ///
    /// **Arguments**
    ///
    /// * `dpy` - The current X11 `Display`
    /// * `target` - Attribute query target (`CTRL_TARGET`)
    /// * `id` - target id
    /// * `mask` - Attribute mask
    /// * `attribute` - Attribute to query (`CTRL_ATTR`)
    /// * `value` - The value of the attribute that will be populated upon function call
    fn XNVCTRLQueryTargetAttribute(
        dpy: *mut Display,
        target: CTRL_TARGET,
        id: c_int,
        mask: c_uint,
        attribute: CTRL_ATTR,
        value: *mut c_int,
    ) -> c_int;

    fn XNVCTRLSetTargetAttributeAndGetStatus(
        dpy: *mut Display,
        target: CTRL_TARGET,
        id: c_int,
        mask: c_uint,
        attribute: CTRL_ATTR,
        value: c_int,
    ) -> c_int;

    /// Allocates `value`, free it with `XFree`
    fn XNVCTRLQueryTargetStringAttribute(
        dpy: *mut Display,
        target: CTRL_TARGET,
        id: c_int,
        mask: c_uint,
        attribute: CTRL_STRING_ATTR,
        value: *mut *mut c_char,
    ) -> c_int;

    /// Allocates `data`, free it with `XFree`
    fn XNVCTRLQueryTargetBinaryData(
        dpy: *mut Display,
        target: CTRL_TARGET,
        id: c_int,
        mask: c_uint,
        attribute: CTRL_BINARY_ATTR,
        data: *mut *mut c_uchar,
        len: *mut c_int,
    ) -> c_int;
}
