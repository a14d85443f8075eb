use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

use crate::{
    config::{FanProfile, UNKNOWN_UTILIZATION},
    display::StatusRenderer,
    error::{HwError, StartupError},
    gpu::Gpu,
    hysteresis,
};

/// Readings tracked across ticks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuState {
    pub current_temp: Option<i32>,
    pub last_acted_temp: Option<i32>,
    pub min_seen_temp: Option<i32>,
    pub max_seen_temp: Option<i32>,
    pub current_duty: i32,
    pub num_fans: u32,
    pub utilization_text: String,
}

impl GpuState {
    pub fn new(num_fans: u32) -> Self {
        Self {
            current_temp: None,
            last_acted_temp: None,
            min_seen_temp: None,
            max_seen_temp: None,
            current_duty: 0,
            num_fans,
            utilization_text: UNKNOWN_UTILIZATION.to_string(),
        }
    }

    pub fn record_temp(&mut self, temp_c: i32) {
        self.current_temp = Some(temp_c);
        self.min_seen_temp = Some(self.min_seen_temp.map_or(temp_c, |t| t.min(temp_c)));
        self.max_seen_temp = Some(self.max_seen_temp.map_or(temp_c, |t| t.max(temp_c)));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Uninitialized,
    Running,
    Terminated,
}

/// What a single tick ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Temperature could not be read, nothing else was done
    Skipped,
    /// Within the hysteresis band, fans left alone
    Held,
    /// Every fan was set to this duty
    Applied(u8),
    /// At least one fan write failed, retried next tick
    WriteFailed,
}

pub struct ControlLoop<G: Gpu, R: StatusRenderer> {
    gpu: G,
    renderer: R,
    profile: FanProfile,
    state: GpuState,
    phase: LoopState,
}

impl<G: Gpu, R: StatusRenderer> ControlLoop<G, R> {
    pub fn new(gpu: G, renderer: R, profile: FanProfile) -> Self {
        Self {
            gpu,
            renderer,
            profile,
            state: GpuState::new(0),
            phase: LoopState::Uninitialized,
        }
    }

    /// Takes over the fans. Any error here is fatal.
    pub fn init(&mut self) -> Result<(), StartupError> {
        if self.phase != LoopState::Uninitialized {
            return Err(HwError::Init(format!("control loop already {:?}", self.phase)).into());
        }

        self.gpu.enable_manual_fan_control()?;

        let num_fans = match self.gpu.query_fan_count() {
            Ok(n) => n,
            Err(err) => {
                if let Err(restore_err) = self.gpu.restore_auto_fan_control() {
                    log::warn!("could not restore automatic fan control: {}", restore_err);
                }
                return Err(err.into());
            }
        };
        if num_fans == 0 {
            log::warn!("driver reports no fans, nothing will be controlled");
        }

        log::info!(
            "controlling {} fan(s), hysteresis {}C, refresh every {:?}",
            num_fans,
            self.profile.hysteresis,
            self.profile.refresh_interval
        );

        self.state = GpuState::new(num_fans);
        self.phase = LoopState::Running;
        Ok(())
    }

    #[cfg(test)]
    fn phase(&self) -> LoopState {
        self.phase
    }

    #[cfg(test)]
    fn state(&self) -> &GpuState {
        &self.state
    }

    /// One read -> render -> decide -> act pass
    pub fn tick(&mut self) -> Tick {
        let temp = match self.gpu.query_temperature() {
            Ok(temp) => temp,
            Err(err) => {
                log::warn!("skipping tick: {}", err);
                return Tick::Skipped;
            }
        };
        self.state.record_temp(temp);

        match self.gpu.query_fan_duty(0) {
            Ok(duty) => self.state.current_duty = duty,
            Err(err) => log::warn!("keeping last known duty: {}", err),
        }

        self.state.utilization_text = self.gpu.query_utilization_text().unwrap_or_else(|err| {
            log::debug!("{}", err);
            UNKNOWN_UTILIZATION.to_string()
        });

        log::debug!("current temp: {}C, current duty: {}%", temp, self.state.current_duty);

        if let Err(err) = self.renderer.render(&self.state) {
            log::warn!("could not draw status: {}", err);
        }

        if !hysteresis::should_act(temp, self.state.last_acted_temp, self.profile.hysteresis) {
            log::debug!(
                "not changing fans ({}C, last acted at {:?})",
                temp,
                self.state.last_acted_temp
            );
            return Tick::Held;
        }

        let duty = self.profile.duty_table.get(temp).unwrap_or_else(|| {
            log::warn!("{}C is outside the fan curve, using the nearest entry", temp);
            self.profile.duty_table.duty_for(temp)
        });
        let mut all_ok = true;
        for fan in 0..self.state.num_fans {
            if let Err(err) = self.gpu.set_fan_duty(fan, duty) {
                log::warn!("fan {}: {}", fan, err);
                all_ok = false;
            }
        }

        if !all_ok {
            return Tick::WriteFailed;
        }

        log::info!("{}C: setting fans to {}%", temp, duty);
        self.state.last_acted_temp = Some(temp);
        Tick::Applied(duty)
    }

    /// Ticks every `refresh_interval` until `keep_running` is cleared, then shuts down.
    /// The flag is only looked at between ticks.
    pub fn run(&mut self, keep_running: &AtomicBool) {
        while self.phase == LoopState::Running && keep_running.load(Ordering::SeqCst) {
            self.tick();
            thread::sleep(self.profile.refresh_interval);
        }
        self.shutdown();
    }

    /// Hands the fans back to the driver. The handle itself goes with `self`.
    pub fn shutdown(&mut self) {
        if self.phase != LoopState::Running {
            return;
        }

        log::info!("stopping...");
        if let Err(err) = self.gpu.restore_auto_fan_control() {
            log::warn!("could not restore automatic fan control: {}", err);
        }
        if let Err(err) = self.renderer.finish() {
            log::warn!("could not reset terminal: {}", err);
        }
        self.phase = LoopState::Terminated;
    }
}

impl<G: Gpu, R: StatusRenderer> Drop for ControlLoop<G, R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
