//! Host build-tool plugin protocol.
//!
//! Mirrors the resolve/load hook surface of an esbuild-style bundler: the
//! host routes import specifiers to the plugin by namespace, and the
//! plugin answers with resolutions, module contents or error message
//! lists. Side-channel data travels between stages as the tagged
//! [`PluginData`] union and is validated at every namespace boundary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::pipeline::variants::VariantSet;

/// Namespace of the synthesized descriptor module.
pub const NAMESPACE_DESCRIPTOR: &str = "respimg/descriptor";

/// Namespace of the final per-variant binary assets.
pub const NAMESPACE_ASSET: &str = "respimg/asset";

/// A protocol-level error message. Errors cross the host boundary as
/// values, never as panics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
}

impl Message {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// How the host should interpret loaded contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loader {
    /// JavaScript module source
    Js,
    /// Binary asset emitted to the output directory
    File,
}

/// Parsed query parameters attached by the entry resolver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorRequest {
    pub params: Vec<(String, String)>,
}

/// Tagged side-channel data passed between resolve/load stages.
///
/// Each stage accepts exactly one variant; anything else is a protocol
/// error for that import, not a crash.
#[derive(Debug, Clone)]
pub enum PluginData {
    /// Entry resolve → descriptor load: the parsed import query.
    Descriptor(DescriptorRequest),

    /// Descriptor load → variant resolve: the full variant list.
    Variants(Arc<VariantSet>),

    /// Variant resolve → asset load: one variant's encoded bytes.
    Asset(Vec<u8>),
}

/// Arguments to a resolve hook.
#[derive(Debug, Clone)]
pub struct ResolveArgs {
    /// The import specifier as written.
    pub path: String,

    /// Namespace of the importing module; empty or `file` for entries.
    pub namespace: String,

    /// Directory relative specifiers resolve against.
    pub resolve_dir: PathBuf,

    pub plugin_data: Option<PluginData>,
}

/// A successful resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub path: String,
    pub namespace: String,
    pub external: bool,

    /// Files the host should watch for rebuilds.
    pub watch_files: Vec<PathBuf>,

    pub plugin_data: Option<PluginData>,
}

/// Result of a resolve hook.
#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    Resolved(Resolution),
    Errors(Vec<Message>),
    /// Not this plugin's import; the host keeps looking.
    Ignored,
}

impl ResolveOutcome {
    pub fn error(text: impl Into<String>) -> Self {
        Self::Errors(vec![Message::new(text)])
    }
}

/// Arguments to a load hook.
#[derive(Debug, Clone)]
pub struct LoadArgs {
    pub path: String,
    pub namespace: String,
    pub plugin_data: Option<PluginData>,
}

/// A successfully loaded module or asset.
#[derive(Debug, Clone)]
pub struct LoadedModule {
    pub contents: Vec<u8>,
    pub loader: Loader,
    pub plugin_data: Option<PluginData>,
}

/// Result of a load hook.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded(LoadedModule),
    Errors(Vec<Message>),
    Ignored,
}

impl LoadOutcome {
    pub fn error(text: impl Into<String>) -> Self {
        Self::Errors(vec![Message::new(text)])
    }
}

/// The host bundler's own path resolution, delegated to during entry
/// resolution.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolve `specifier` relative to `resolve_dir`.
    async fn resolve(&self, specifier: &str, resolve_dir: &Path) -> ResolveOutcome;
}
