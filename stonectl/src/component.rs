//! The fixed set of installable components.
//!
//! Every component has a baked-in source URL and payload kind. The pipeline
//! itself works on [`ComponentSpec`] values so that tests can point a spec at
//! a local server; [`Component::spec`] produces the production ones.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default installation root, relative to the working directory.
pub const DEFAULT_ROOT: &str = ".stone";

/// Mount points the sandbox-root component needs inside its tree.
///
/// The supervisor bind-mounts host directories onto these paths, so they
/// must exist after extraction.
pub const SANDBOX_MOUNT_POINTS: [&str; 3] = ["proc", "tmp", "dev"];

/// How a component's payload is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    /// gzip-compressed tar archive, extracted into a directory.
    Archive,
    /// A single executable, copied as-is.
    Raw,
}

/// One of the installable units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    /// The server core; its directory is the supervisor's sandbox root.
    Core,
    /// The game payload, bind-mounted into the core sandbox.
    Game,
    /// The process supervisor executable.
    Supervisor,
}

impl Component {
    /// All components in installation order.
    pub const ALL: [Component; 3] = [Component::Core, Component::Game, Component::Supervisor];

    /// Short name used in paths and progress output.
    pub fn name(&self) -> &'static str {
        match self {
            Component::Core => "core",
            Component::Game => "game",
            Component::Supervisor => "nsgod",
        }
    }

    /// Source URL of the payload.
    pub fn url(&self) -> &'static str {
        match self {
            Component::Core => "https://hertz.services/docker/codehz/stoneserver/0",
            Component::Game => "https://hertz.services/docker/codehz/mcbe/0",
            Component::Supervisor => "https://hertz.services/github/codehz/nsgod/latest/nsgod",
        }
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            Component::Core | Component::Game => PayloadKind::Archive,
            Component::Supervisor => PayloadKind::Raw,
        }
    }

    /// File whose presence marks an archive component as installed,
    /// relative to the component directory.
    pub fn marker(&self) -> Option<&'static str> {
        match self {
            Component::Core => Some("run/stone"),
            Component::Game => Some("libs/libminecraftpe.so"),
            Component::Supervisor => None,
        }
    }

    /// Human-readable description used by the installation check.
    pub fn description(&self) -> &'static str {
        match self {
            Component::Core => "StoneServer core",
            Component::Game => "Minecraft (bedrock edition)",
            Component::Supervisor => "nsgod (process manager)",
        }
    }

    /// Build the pipeline spec for this component.
    pub fn spec(&self) -> ComponentSpec {
        ComponentSpec {
            name: self.name().to_string(),
            url: self.url().to_string(),
            kind: self.kind(),
            sandbox_root: matches!(self, Component::Core),
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Component {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Component::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| format!("unknown component: {}", s))
    }
}

/// Everything the pipeline needs to know about one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSpec {
    /// Identity; also the destination name under the installation root.
    pub name: String,
    /// Where the payload is fetched from.
    pub url: String,
    pub kind: PayloadKind,
    /// Whether the extracted tree needs the sandbox mount points.
    pub sandbox_root: bool,
}

impl ComponentSpec {
    /// Create a spec with an explicit URL.
    pub fn new(name: impl Into<String>, url: impl Into<String>, kind: PayloadKind) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind,
            sandbox_root: false,
        }
    }

    /// Mark this component as a sandbox root.
    pub fn with_sandbox_root(mut self, sandbox_root: bool) -> Self {
        self.sandbox_root = sandbox_root;
        self
    }

    /// Destination under `root`: a directory for archives, a file for raw payloads.
    pub fn destination(&self, root: &Path) -> PathBuf {
        root.join(&self.name)
    }
}
