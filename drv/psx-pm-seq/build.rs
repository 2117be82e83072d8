// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt::Write;
use std::{env, fs, path::PathBuf};

const CONFIG_VAR: &str = "PSX_PM_TIMING_CONFIG";

const APU_STAGES: usize = 4;
const RPU_STAGES: usize = 1;
const GEM_INSTANCES: usize = 2;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TimingConfig {
    system_counter: SystemCounter,
    handshake: Handshake,
    application_core: CoreTiming,
    real_time_core: CoreTiming,
    memory: MemoryTiming,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SystemCounter {
    frequency_hz: u64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Handshake {
    paccept_timeout_us: u32,
    pactive_timeout_us: u32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CoreTiming {
    stage_ack_timeout_us: Vec<u32>,
    stage_settle_us: Vec<u32>,
    power_down_ack_timeout_us: u32,
    clock_propagation_us: u32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MemoryTiming {
    ocm_ack_timeout_us: u32,
    tcm_ack_timeout_us: u32,
    tcm_settle_us: u32,
    gem: Vec<GemTiming>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct GemTiming {
    ack_timeout_us: u32,
    settle_us: u32,
}

fn main() -> Result<()> {
    let config = load()?;
    validate(&config)?;

    let out = PathBuf::from(env::var_os("OUT_DIR").context("no OUT_DIR")?);
    fs::write(out.join("pm_timing.rs"), generate(&config)?)?;
    Ok(())
}

fn load() -> Result<TimingConfig> {
    println!("cargo:rerun-if-env-changed={CONFIG_VAR}");
    println!("cargo:rerun-if-changed=timing.toml");

    let text = match env::var(CONFIG_VAR) {
        Ok(text) => {
            println!("--- timing from ${CONFIG_VAR} ---");
            println!("{text}");
            text
        }
        Err(_) => fs::read_to_string("timing.toml")
            .context("reading timing.toml")?,
    };
    toml::from_str(&text).context("parsing timing configuration")
}

fn validate(config: &TimingConfig) -> Result<()> {
    let hz = config.system_counter.frequency_hz;
    if hz == 0 || hz % 1_000_000 != 0 {
        bail!("system counter frequency {hz} is not a whole number of MHz");
    }

    for (name, core, stages) in [
        ("application_core", &config.application_core, APU_STAGES),
        ("real_time_core", &config.real_time_core, RPU_STAGES),
    ] {
        if core.stage_ack_timeout_us.len() != stages
            || core.stage_settle_us.len() != stages
        {
            bail!("{name} needs exactly {stages} power-up stages");
        }
        if core.stage_ack_timeout_us.contains(&0)
            || core.power_down_ack_timeout_us == 0
        {
            bail!("{name} has a zero acknowledgment timeout");
        }
    }

    let h = &config.handshake;
    let m = &config.memory;
    if h.paccept_timeout_us == 0
        || h.pactive_timeout_us == 0
        || m.ocm_ack_timeout_us == 0
        || m.tcm_ack_timeout_us == 0
    {
        bail!("handshake and memory timeouts must be non-zero");
    }
    if m.gem.len() != GEM_INSTANCES {
        bail!("expected {GEM_INSTANCES} [[memory.gem]] entries");
    }
    if m.gem.iter().any(|g| g.ack_timeout_us == 0) {
        bail!("network memory timeouts must be non-zero");
    }
    Ok(())
}

fn array(values: impl Iterator<Item = u32>) -> String {
    let items: Vec<String> = values.map(|v| v.to_string()).collect();
    format!("[{}]", items.join(", "))
}

fn generate(config: &TimingConfig) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "// Generated from the timing configuration by build.rs.")?;
    writeln!(
        out,
        "pub const SYS_COUNTER_TICKS_PER_US: u32 = {};",
        config.system_counter.frequency_hz / 1_000_000
    )?;
    writeln!(
        out,
        "pub const PACCEPT_TIMEOUT_US: u32 = {};",
        config.handshake.paccept_timeout_us
    )?;
    writeln!(
        out,
        "pub const PACTIVE_TIMEOUT_US: u32 = {};",
        config.handshake.pactive_timeout_us
    )?;

    for (prefix, core, stages) in [
        ("APU", &config.application_core, APU_STAGES),
        ("RPU", &config.real_time_core, RPU_STAGES),
    ] {
        writeln!(
            out,
            "pub const {prefix}_STAGE_ACK_TIMEOUT_US: [u32; {stages}] = {};",
            array(core.stage_ack_timeout_us.iter().copied())
        )?;
        writeln!(
            out,
            "pub const {prefix}_STAGE_SETTLE_US: [u32; {stages}] = {};",
            array(core.stage_settle_us.iter().copied())
        )?;
        writeln!(
            out,
            "pub const {prefix}_PWR_DWN_ACK_TIMEOUT_US: u32 = {};",
            core.power_down_ack_timeout_us
        )?;
        writeln!(
            out,
            "pub const {prefix}_CLK_PROP_TIME_US: u32 = {};",
            core.clock_propagation_us
        )?;
    }

    let m = &config.memory;
    let ocm = m.ocm_ack_timeout_us;
    writeln!(out, "pub const OCM_ACK_TIMEOUT_US: u32 = {ocm};")?;
    let tcm = m.tcm_ack_timeout_us;
    writeln!(out, "pub const TCM_ACK_TIMEOUT_US: u32 = {tcm};")?;
    writeln!(out, "pub const TCM_SETTLE_US: u32 = {};", m.tcm_settle_us)?;
    writeln!(
        out,
        "pub const GEM_ACK_TIMEOUT_US: [u32; {GEM_INSTANCES}] = {};",
        array(m.gem.iter().map(|g| g.ack_timeout_us))
    )?;
    writeln!(
        out,
        "pub const GEM_SETTLE_US: [u32; {GEM_INSTANCES}] = {};",
        array(m.gem.iter().map(|g| g.settle_us))
    )?;

    Ok(out)
}
