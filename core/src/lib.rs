pub mod address;
pub mod blocks;
pub mod chain;
pub mod config;
pub mod digest;
pub mod errors;
pub mod plot;
pub mod rewards;
pub mod utils;

fn _version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
fn _pkg_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}

pub fn version() -> String {
    format!("{}: {}", _pkg_name(), _version())
}

#[test]
fn test_version() {
    println!("{}", version());
}
