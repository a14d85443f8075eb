use regex::Regex;
use std::collections::BTreeSet;

use crate::{config::GPU_INDEX, error::HwError, gpu::Gpu, util};

/// `[fan:N]` targets in `nvidia-settings -q fans` output
const FAN_TARGET_PATTERN: &str = r"\[fan:(?<idx>\d+)\]";

/// `Gpu` backed by `nvidia-settings` invocations against the current X display.
/// Fan control needs Coolbits enabled in the X config.
///
/// `nvidia-settings -q fans` lists every fan on the X server, not just the
/// coolers of `GPU_INDEX`. On a multi-GPU host every fan follows this GPU's
/// temperature; build with the `xnvctrl` feature to drive only its own coolers.
pub struct NvSettings {
    gpu: String,
    fan_target: Regex,
}

impl NvSettings {
    pub fn open() -> Result<Self, HwError> {
        let nv = Self {
            gpu: format!("[gpu:{}]", GPU_INDEX),
            fan_target: Regex::new(FAN_TARGET_PATTERN).map_err(|e| HwError::Init(e.to_string()))?,
        };

        // fail early if nvidia-settings is missing or cannot reach the driver
        nv.query("GPUCoreTemp", &nv.gpu)
            .map_err(|e| HwError::Init(format!("nvidia-settings unusable: {}", e)))?;

        Ok(nv)
    }

    /// nvidia-settings -q "[target]/attr" -t
    fn query(&self, attr: &str, target: &str) -> Result<String, String> {
        util::make_call(
            "nvidia-settings query",
            "nvidia-settings",
            &["-q", &format!("{}/{}", target, attr), "-t"],
        )
    }

    /// nvidia-settings -a "[target]/attr=value"
    fn assign(&self, attr: &str, target: &str, value: impl std::fmt::Display) -> Result<(), String> {
        util::make_call(
            "nvidia-settings assign",
            "nvidia-settings",
            &["-a", &format!("{}/{}={}", target, attr, value)],
        )
        .map(|_| ())
    }
}

impl Gpu for NvSettings {
    fn enable_manual_fan_control(&mut self) -> Result<(), HwError> {
        self.assign("GPUFanControlState", &self.gpu, 1).map_err(HwError::Init)
    }

    fn restore_auto_fan_control(&mut self) -> Result<(), HwError> {
        self.assign("GPUFanControlState", &self.gpu, 0).map_err(HwError::Actuation)
    }

    fn query_fan_count(&mut self) -> Result<u32, HwError> {
        let out = util::make_call("nvidia-settings query fans", "nvidia-settings", &["-q", "fans"])
            .map_err(HwError::Init)?;
        Ok(count_fans(&self.fan_target, &out))
    }

    fn query_temperature(&mut self) -> Result<i32, HwError> {
        let out = self.query("GPUCoreTemp", &self.gpu).map_err(HwError::Sensor)?;
        parse_int(&out).map_err(HwError::Sensor)
    }

    fn query_fan_duty(&mut self, fan_index: u32) -> Result<i32, HwError> {
        let out = self
            .query("GPUCurrentFanSpeed", &format!("[fan:{}]", fan_index))
            .map_err(HwError::Sensor)?;
        parse_int(&out).map_err(HwError::Sensor)
    }

    fn query_utilization_text(&mut self) -> Result<String, HwError> {
        let out = self.query("GPUUtilization", &self.gpu).map_err(HwError::Sensor)?;
        Ok(out.trim().to_string())
    }

    fn set_fan_duty(&mut self, fan_index: u32, duty_pct: u8) -> Result<(), HwError> {
        self.assign("GPUTargetFanSpeed", &format!("[fan:{}]", fan_index), duty_pct)
            .map_err(HwError::Actuation)
    }
}

/// Distinct `[fan:N]` targets in `nvidia-settings -q fans` output
fn count_fans(fan_target: &Regex, output: &str) -> u32 {
    let fans: BTreeSet<&str> = fan_target
        .captures_iter(output)
        .filter_map(|c| c.name("idx").map(|m| m.as_str()))
        .collect();
    log::debug!("fans reported by nvidia-settings: {:?}", fans);
    fans.len() as u32
}

fn parse_int(output: &str) -> Result<i32, String> {
    let trimmed = output.trim();
    trimmed
        .parse()
        .map_err(|e| format!("unexpected nvidia-settings output '{}': {}", trimmed, e))
}
