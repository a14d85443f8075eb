mod config;
mod control;
mod curve;
mod display;
mod error;
mod gpu;
mod hysteresis;
#[cfg(not(feature = "xnvctrl"))]
mod nv;
#[cfg(not(feature = "xnvctrl"))]
mod util;
#[cfg(feature = "xnvctrl")]
mod x11;

use std::{
    env, io,
    path::PathBuf,
    process::ExitCode,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use config::{FanProfile, DEFAULT_CONFIG_PATH};
use control::ControlLoop;
use display::TerminalRenderer;
use error::{HwError, StartupError};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit code for any failure before the control loop starts
const EXIT_STARTUP_FAILURE: u8 = 255;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting ({})...", VERSION);

    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_sigint_handler_ref = keep_running.clone();

    if let Err(err) = ctrlc::set_handler(move || {
        keep_running_sigint_handler_ref.store(false, Ordering::SeqCst);
    }) {
        log::error!("error setting Ctrl-C handler: {}", err);
        return ExitCode::from(EXIT_STARTUP_FAILURE);
    }

    match start(&keep_running) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::from(EXIT_STARTUP_FAILURE)
        }
    }
}

fn start(keep_running: &AtomicBool) -> Result<(), StartupError> {
    let path = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let profile = FanProfile::load(&path)?;
    log::info!(
        "loaded {} curve point(s) from {:?}, fan stop {}",
        profile.points.len(),
        path,
        if profile.fan_stop { "on" } else { "off" }
    );
    for (temp, duty) in profile.duty_table.iter() {
        log::trace!("{:>3}C -> {:>3}%", temp, duty);
    }

    let gpu = open_gpu()?;
    let mut control = ControlLoop::new(gpu, TerminalRenderer::new(io::stdout()), profile);
    control.init()?;
    control.run(keep_running);

    Ok(())
}

#[cfg(not(feature = "xnvctrl"))]
fn open_gpu() -> Result<nv::NvSettings, HwError> {
    nv::NvSettings::open()
}

#[cfg(feature = "xnvctrl")]
fn open_gpu() -> Result<x11::XnvCtrl, HwError> {
    x11::XnvCtrl::open()
}
