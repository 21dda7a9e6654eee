//! Launch commands - supervisor request and environment.

use std::path::Path;

use stonectl::launch::{LaunchRequest, SupervisorEndpoint};

use crate::error::CliError;

/// Print the supervisor `start` request for `service` as JSON.
pub fn run_spec(root: &Path, service: &str) -> Result<(), CliError> {
    let request = LaunchRequest::new(root, service)?;
    let json = request
        .to_json_pretty()
        .map_err(|e| CliError::Output(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

/// Print the environment the supervisor must be started with.
pub fn run_env(root: &Path) -> Result<(), CliError> {
    for (key, value) in SupervisorEndpoint::for_root(root).env() {
        println!("{}={}", key, value);
    }
    Ok(())
}
