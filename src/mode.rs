//! Execution modes, mode tags and mode resolution.
//!
//! A callable can carry a [`ModeTag`] that names the context it wants to run
//! in. Tags are attached at compile time with [`Tagged`], looked up from a
//! [`ModeRegistry`] populated at startup, or supplied by any type implementing
//! [`ModeSource`].

use crate::error::{Error, Result};
use crate::executor::Task;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The execution context a task runs in.
///
/// Adding or removing variants is a breaking change for every caller that
/// stores tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum ExecutionMode {
    /// No preference; resolves to the dispatcher's default.
    #[default]
    Unspecified,
    /// Run synchronously on the posting thread.
    #[cfg_attr(feature = "serde", serde(alias = "posting"))]
    Immediate,
    /// Serial queue drained on the shared pool.
    Background,
    /// The host's main context.
    Main,
    /// Second serial queue on the shared pool, independent of `Background`.
    Async,
}

impl ExecutionMode {
    /// Every mode, in declaration order.
    pub const ALL: [ExecutionMode; 5] = [
        ExecutionMode::Unspecified,
        ExecutionMode::Immediate,
        ExecutionMode::Background,
        ExecutionMode::Main,
        ExecutionMode::Async,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Immediate => "immediate",
            Self::Background => "background",
            Self::Main => "main",
            Self::Async => "async",
        }
    }

    pub const fn is_specified(self) -> bool {
        !matches!(self, Self::Unspecified)
    }

    /// Whether tasks in this mode go through a queue.
    pub const fn is_queued(self) -> bool {
        matches!(self, Self::Background | Self::Main | Self::Async)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unspecified" => Ok(Self::Unspecified),
            "immediate" | "posting" => Ok(Self::Immediate),
            "background" => Ok(Self::Background),
            "main" => Ok(Self::Main),
            "async" => Ok(Self::Async),
            _ => Err(Error::invalid_mode(s)),
        }
    }
}

/// Metadata carrying one preferred [`ExecutionMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModeTag {
    mode: ExecutionMode,
}

impl ModeTag {
    pub const fn new(mode: ExecutionMode) -> Self {
        Self { mode }
    }

    pub const fn mode(self) -> ExecutionMode {
        self.mode
    }
}

impl From<ExecutionMode> for ModeTag {
    fn from(mode: ExecutionMode) -> Self {
        Self::new(mode)
    }
}

/// Something a mode tag can be read from without running it.
///
/// A lookup error is not fatal: resolution falls back to the default mode.
pub trait ModeSource {
    fn mode_tag(&self) -> Result<Option<ModeTag>>;
}

impl ModeSource for ModeTag {
    fn mode_tag(&self) -> Result<Option<ModeTag>> {
        Ok(Some(*self))
    }
}

impl ModeSource for Option<ModeTag> {
    fn mode_tag(&self) -> Result<Option<ModeTag>> {
        Ok(*self)
    }
}

/// A callable paired with its mode tag.
pub struct Tagged<F> {
    tag: ModeTag,
    f: F,
}

impl<F> Tagged<F> {
    pub fn new(mode: ExecutionMode, f: F) -> Self {
        Self {
            tag: ModeTag::new(mode),
            f,
        }
    }

    pub fn main(f: F) -> Self {
        Self::new(ExecutionMode::Main, f)
    }

    pub fn background(f: F) -> Self {
        Self::new(ExecutionMode::Background, f)
    }

    pub fn asynchronous(f: F) -> Self {
        Self::new(ExecutionMode::Async, f)
    }

    pub fn immediate(f: F) -> Self {
        Self::new(ExecutionMode::Immediate, f)
    }

    pub fn tag(&self) -> ModeTag {
        self.tag
    }

    pub fn into_inner(self) -> F {
        self.f
    }
}

impl<F> Tagged<F>
where
    F: FnOnce() + Send + 'static,
{
    pub fn into_task(self) -> Task {
        Task::new(self.f)
    }
}

impl<F> ModeSource for Tagged<F> {
    fn mode_tag(&self) -> Result<Option<ModeTag>> {
        Ok(Some(self.tag))
    }
}

impl<F> fmt::Debug for Tagged<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tagged").field("tag", &self.tag).finish()
    }
}

/// Startup-populated table mapping stable callable identifiers to tags.
#[derive(Debug, Default)]
pub struct ModeRegistry {
    entries: RwLock<HashMap<String, ModeTag>>,
}

impl ModeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: impl Into<String>, mode: ExecutionMode) -> &Self {
        self.entries.write().insert(id.into(), ModeTag::new(mode));
        self
    }

    /// Register a tag given by name, e.g. from a config file.
    pub fn register_str(&self, id: impl Into<String>, mode: &str) -> Result<()> {
        let mode = mode.parse::<ExecutionMode>()?;
        self.register(id, mode);
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Option<ModeTag> {
        self.entries.write().remove(id)
    }

    pub fn get(&self, id: &str) -> Option<ModeTag> {
        self.entries.read().get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// A [`ModeSource`] that reads the tag registered under `id`.
    pub fn source<'a>(&'a self, id: &'a str) -> Registered<'a> {
        Registered { registry: self, id }
    }
}

/// Registry lookup for one identifier. Unregistered ids are untagged.
#[derive(Debug, Clone, Copy)]
pub struct Registered<'a> {
    registry: &'a ModeRegistry,
    id: &'a str,
}

impl ModeSource for Registered<'_> {
    fn mode_tag(&self) -> Result<Option<ModeTag>> {
        Ok(self.registry.get(self.id))
    }
}

/// Resolves the target mode of a post.
///
/// An explicit, specified mode wins. Otherwise the source's tag is used, and
/// without one the default. A result that is still `Unspecified` becomes
/// `Background`.
pub fn resolve(
    explicit: Option<ExecutionMode>,
    source: Option<&dyn ModeSource>,
    default: ExecutionMode,
) -> ExecutionMode {
    let resolved = match explicit {
        Some(mode) if mode.is_specified() => mode,
        _ => source
            .and_then(read_tag)
            .filter(|mode| mode.is_specified())
            .unwrap_or(default),
    };

    if resolved.is_specified() {
        resolved
    } else {
        ExecutionMode::Background
    }
}

fn read_tag(source: &dyn ModeSource) -> Option<ExecutionMode> {
    match source.mode_tag() {
        Ok(tag) => tag.map(ModeTag::mode),
        Err(err) => {
            tracing::debug!(error = %err, "mode tag lookup failed, using default mode");
            None
        }
    }
}

/// [`resolve`] bound to a configured default.
#[derive(Debug, Clone, Copy)]
pub struct ModeResolver {
    default: ExecutionMode,
}

impl ModeResolver {
    pub fn new(default: ExecutionMode) -> Self {
        Self { default }
    }

    pub fn default_mode(&self) -> ExecutionMode {
        self.default
    }

    pub fn resolve(
        &self,
        explicit: Option<ExecutionMode>,
        source: Option<&dyn ModeSource>,
    ) -> ExecutionMode {
        resolve(explicit, source, self.default)
    }
}
