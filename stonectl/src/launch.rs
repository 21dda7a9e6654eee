//! Supervisor launch boundary.
//!
//! The installed tree is run by the `nsgod` supervisor, which takes a JSON
//! launch request per service. This module builds that request; talking to
//! the supervisor is outside this crate.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::component::Component;

/// Errors building a launch request.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("service name must not be empty")]
    EmptyServiceName,

    #[error("service name must not contain '.': {0}")]
    InvalidServiceName(String),

    #[error("service directory does not exist: {0}")]
    MissingServiceDir(String),

    #[error("failed to resolve {}: {source}", .path.display())]
    Resolve { path: PathBuf, source: io::Error },
}

/// Restart behaviour for a supervised process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPolicy {
    pub enabled: bool,
    pub max: u32,
    /// Serialized as milliseconds.
    #[serde(with = "millis")]
    pub reset_timer: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max: 5,
            reset_timer: Duration::from_secs(60),
        }
    }
}

/// Process launch options in the shape the supervisor accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchOptions {
    pub waitstop: bool,
    pub pty: bool,
    pub cmdline: Vec<String>,
    /// Sandbox root on the host.
    pub root: String,
    /// Working directory inside the sandbox.
    pub cwd: String,
    pub log: String,
    pub env: Vec<String>,
    /// Sandbox path to host path.
    pub mounts: BTreeMap<String, String>,
    pub restart: RestartPolicy,
}

impl LaunchOptions {
    /// Options for running the server of `service` from the tree at `root`.
    ///
    /// Paths are made absolute; `service` is the service's data directory.
    pub fn for_service(root: &Path, service: &Path) -> Result<Self, LaunchError> {
        let core = absolute(&root.join(Component::Core.name()))?;
        let game = absolute(&root.join(Component::Game.name()))?;
        let data = absolute(service)?;

        let mut mounts = BTreeMap::new();
        mounts.insert("run/game".to_string(), game);
        mounts.insert("run/data".to_string(), data.clone());
        for dir in ["dev", "proc", "tmp"] {
            mounts.insert(dir.to_string(), format!("/{}", dir));
        }

        Ok(Self {
            waitstop: true,
            pty: true,
            cmdline: vec!["./stone".to_string()],
            root: core,
            cwd: "/run".to_string(),
            log: format!("{}/stone.log", data.trim_end_matches('/')),
            env: vec![
                "STONE_DEBUG=1".to_string(),
                "UPSTART_JOB=stoneserver".to_string(),
                "HOME=/run/data".to_string(),
            ],
            mounts,
            restart: RestartPolicy::default(),
        })
    }
}

/// A `start` call for one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRequest {
    pub service: String,
    pub options: LaunchOptions,
}

impl LaunchRequest {
    /// Validate `service` and build its launch request.
    ///
    /// The service name doubles as its data directory, relative to the
    /// working directory.
    pub fn new(root: &Path, service: &str) -> Result<Self, LaunchError> {
        validate_service_name(service)?;
        let options = LaunchOptions::for_service(root, Path::new(service))?;
        Ok(Self {
            service: service.to_string(),
            options,
        })
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Environment the supervisor is started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorEndpoint {
    pub api: String,
    pub lock: String,
}

impl SupervisorEndpoint {
    pub fn for_root(root: &Path) -> Self {
        let root = root.display();
        Self {
            api: format!("ws+unix://{}/nsgod.socket", root),
            lock: format!("{}/nsgod.lock", root),
        }
    }

    /// `KEY=value` pairs for the supervisor's environment.
    pub fn env(&self) -> Vec<(&'static str, String)> {
        vec![("NSGOD_API", self.api.clone()), ("NSGOD_LOCK", self.lock.clone())]
    }
}

/// Check a service name: non-empty, no '.', and an existing directory.
pub fn validate_service_name(service: &str) -> Result<(), LaunchError> {
    if service.is_empty() {
        return Err(LaunchError::EmptyServiceName);
    }
    if service.contains('.') {
        return Err(LaunchError::InvalidServiceName(service.to_string()));
    }
    if !Path::new(service).is_dir() {
        return Err(LaunchError::MissingServiceDir(service.to_string()));
    }
    Ok(())
}

fn absolute(path: &Path) -> Result<String, LaunchError> {
    std::path::absolute(path)
        .map(|p| p.display().to_string())
        .map_err(|e| LaunchError::Resolve {
            path: path.to_path_buf(),
            source: e,
        })
}

mod millis {
    use super::*;
    use serde::Deserializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
