//! Drive the gripper motor by hand, one command per line:
//!
//! * `a` spin forward, `f` spin in reverse
//! * `c` stop and go back to holding position
//! * `r` reset to the rest angle
//! * `s` print the present position
//! * `q` release the motor and quit

use std::io;
use std::io::{BufRead, Write};

use anyhow::anyhow;
use clap::Parser;
use log::warn;

use harvest_picker::actuator_hal::Direction;
use harvest_picker::config::HardwareConfig;
use harvest_picker::effector_driver::EffectorDriver;
use harvest_picker::harvester_hal_factory::HarvesterHalFactory;
use harvest_picker::sim::{SimBench, SimConnector};

#[derive(Parser, Debug)]
#[clap(name = "effector_console")]
struct Opts {
    #[clap(long, default_value = "100")]
    speed: u32,

    #[clap(long, default_value = "100.0")]
    rest_angle: f64,

    /// Endpoints with simulated hardware behind them (default: all configured endpoints).
    #[clap(long)]
    present: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let opts: Opts = Opts::parse();

    let config = HardwareConfig::default();
    let present = if opts.present.is_empty() {
        config.board_endpoints.iter().chain(&config.arm_endpoints).cloned().collect()
    } else {
        opts.present.clone()
    };
    let connector = SimConnector::new(SimBench::default(), present);
    let hal = HarvesterHalFactory::new(&connector, &config).create_hal()?;
    let mut driver = EffectorDriver::new(hal.actuator);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    print_prompt()?;
    for line in io::stdin().lock().lines() {
        let line = line?;
        let result = match line.trim() {
            "a" => driver.start_rotation(Direction::Forward, opts.speed),
            "f" => driver.start_rotation(Direction::Reverse, opts.speed),
            "c" => rt.block_on(driver.stop_rotation()),
            "r" => driver.reset_to_angle(opts.rest_angle),
            "s" => driver.present_angle().map(|(raw, angle)| {
                println!("position {raw} ({angle:.1}°)");
            }),
            "q" => break,
            "" => Ok(()),
            other => Err(anyhow!("unknown command {other:?}")),
        };
        if let Err(e) = result {
            warn!("{e:#}");
        }
        print_prompt()?;
    }

    driver.shutdown()
}

fn print_prompt() -> anyhow::Result<()> {
    print!("[a]head [f]reverse [c]stop [r]eset [s]tatus [q]uit > ");
    io::stdout().flush()?;
    Ok(())
}
