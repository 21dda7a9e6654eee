//! Installation check.

use std::path::Path;

use thiserror::Error;

use crate::component::Component;

/// First missing piece of an installation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    #[error("not installed at all")]
    RootMissing,

    #[error("{} is not installed", .0.description())]
    ComponentMissing(Component),
}

/// Verify that every component is present under `root`.
///
/// Checks run in order: the root directory, the supervisor executable, then
/// each archive component's directory and marker file.
pub fn check_installation(root: &Path) -> Result<(), CheckError> {
    if !root.is_dir() {
        return Err(CheckError::RootMissing);
    }

    let order = [Component::Supervisor, Component::Core, Component::Game];
    for component in order {
        if !is_installed(root, component) {
            return Err(CheckError::ComponentMissing(component));
        }
    }
    Ok(())
}

fn is_installed(root: &Path, component: Component) -> bool {
    let path = root.join(component.name());
    match component.marker() {
        Some(marker) => path.is_dir() && path.join(marker).is_file(),
        None => path.is_file(),
    }
}
