use crate::error::HwError;

/// What the control loop needs from the driver.
///
/// An implementation owns its control handle: it is acquired by the backend's
/// constructor and released when the value is dropped.
pub trait Gpu {
    fn enable_manual_fan_control(&mut self) -> Result<(), HwError>;

    /// Hands the fans back to the driver's own curve
    fn restore_auto_fan_control(&mut self) -> Result<(), HwError>;

    fn query_fan_count(&mut self) -> Result<u32, HwError>;

    /// Core temperature in C
    fn query_temperature(&mut self) -> Result<i32, HwError>;

    /// Current duty of one fan in %
    fn query_fan_duty(&mut self, fan_index: u32) -> Result<i32, HwError>;

    fn query_utilization_text(&mut self) -> Result<String, HwError>;

    fn set_fan_duty(&mut self, fan_index: u32, duty_pct: u8) -> Result<(), HwError>;
}
