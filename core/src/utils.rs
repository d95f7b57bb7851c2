use rand::seq::SliceRandom;
use rand::Rng;
use std::io::Error;
use tokio::select;
#[cfg(not(target_os = "windows"))]
use tokio::signal::unix::{signal, SignalKind};
#[cfg(target_os = "windows")]
use tokio::signal::windows::{ctrl_break, ctrl_c, ctrl_close, ctrl_logoff, ctrl_shutdown};

pub const NODE_NAME_MAX_LENGTH: usize = 64;
pub const TRIMMED_NAME_LENGTH: usize = 20;

const ADJECTIVES: &[&str] = &[
    "ancient", "brave", "calm", "clever", "cosmic", "crimson", "curious", "daring", "eager",
    "electric", "fancy", "fearless", "gentle", "golden", "happy", "hidden", "humble", "jolly",
    "lively", "lucky", "mighty", "misty", "noble", "patient", "quiet", "rapid", "silent",
    "silver", "steady", "swift", "tidy", "vivid", "wandering", "wise", "witty", "zealous",
];
const NOUNS: &[&str] = &[
    "acorn", "badger", "beacon", "canyon", "comet", "cedar", "dolphin", "falcon", "forest",
    "glacier", "harbor", "island", "kestrel", "lantern", "meadow", "meteor", "mountain",
    "nebula", "orchard", "otter", "panda", "pebble", "quasar", "raven", "river", "sparrow",
    "summit", "thunder", "tiger", "valley", "walrus", "willow", "wolf", "yak", "zephyr",
];

/// Waits for the first termination signal and returns its name.
#[cfg(not(target_os = "windows"))]
pub async fn await_termination() -> Result<&'static str, Error> {
    let mut term_signal = signal(SignalKind::terminate())?;
    let mut int_signal = signal(SignalKind::interrupt())?;
    let mut quit_signal = signal(SignalKind::quit())?;
    let mut hup_signal = signal(SignalKind::hangup())?;
    let name = select! {
        _ = term_signal.recv() => "SIGTERM",
        _ = int_signal.recv() => "SIGINT",
        _ = quit_signal.recv() => "SIGQUIT",
        _ = hup_signal.recv() => "SIGHUP",
    };
    Ok(name)
}

#[cfg(target_os = "windows")]
pub async fn await_termination() -> Result<&'static str, Error> {
    let mut ctrl_break_signal = ctrl_break()?;
    let mut ctrl_c_signal = ctrl_c()?;
    let mut ctrl_close_signal = ctrl_close()?;
    let mut ctrl_logoff_signal = ctrl_logoff()?;
    let mut ctrl_shutdown_signal = ctrl_shutdown()?;
    let name = select! {
        _ = ctrl_break_signal.recv() => "CTRL_BREAK",
        _ = ctrl_c_signal.recv() => "CTRL_C",
        _ = ctrl_close_signal.recv() => "CTRL_CLOSE",
        _ = ctrl_logoff_signal.recv() => "CTRL_LOGOFF",
        _ = ctrl_shutdown_signal.recv() => "CTRL_SHUTDOWN",
    };
    Ok(name)
}

/// Random `adjective-noun-NNNN` name for the local node.
pub fn generate_node_name() -> String {
    let mut rng = rand::thread_rng();
    loop {
        let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("brave");
        let noun = NOUNS.choose(&mut rng).copied().unwrap_or("farmer");
        let num: u16 = rng.gen_range(1000..=9999);
        let name = format!("{adjective}-{noun}-{num}");
        if name.len() <= NODE_NAME_MAX_LENGTH {
            return name;
        }
    }
}

pub fn trimmed_name(name: &str) -> String {
    if name.chars().count() > TRIMMED_NAME_LENGTH {
        let head: String = name.chars().take(TRIMMED_NAME_LENGTH).collect();
        format!("{head}...")
    } else {
        name.to_string()
    }
}
