//! Host platform (linux for example) utility functions

use std::env;
use std::path::PathBuf;

/// Environment variable pointing at the root of the software checkout.
pub const SW_ROOT_ENV_VAR: &str = "ACT_HAL_ROOT";

/// Get the software root directory from the `ACT_HAL_ROOT` environment
/// variable.
pub fn get_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}

/// Get a short description of the host this executable is running on.
pub fn get_host_info() -> String {
    format!("{} ({})", env::consts::OS, env::consts::ARCH)
}
