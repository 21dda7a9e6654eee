//! Check command - verify the current installation.

use std::path::Path;

use stonectl::check::check_installation;

use crate::error::CliError;

pub fn run(root: &Path) -> Result<(), CliError> {
    check_installation(root)?;
    println!("All components are installed in {}", root.display());
    Ok(())
}
