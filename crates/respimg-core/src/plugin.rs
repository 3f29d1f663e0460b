//! The three-namespace resolution state machine.
//!
//! 1. **Entry resolve**: a `respimg+file:` specifier is split into the
//!    real file path (delegated to the host's resolver) and its query,
//!    then re-tagged into the descriptor namespace.
//! 2. **Descriptor load**: validation, width resolution and variant
//!    generation run, and the virtual module source is synthesized; the
//!    variant list rides along as plugin data.
//! 3. **Variant resolve / asset load**: each nested token import is
//!    decoded, bounds-checked, renamed to its final asset path and
//!    answered with the in-memory buffer. No intermediate file ever
//!    touches disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::codec::{ImageCodec, RasterCodec};
use crate::config::Options;
use crate::descriptor::RequestSpec;
use crate::error::{PipelineError, TokenError};
use crate::host::{
    DescriptorRequest, HostResolver, LoadArgs, LoadOutcome, LoadedModule, Loader, Message,
    PluginData, Resolution, ResolveArgs, ResolveOutcome, NAMESPACE_ASSET, NAMESPACE_DESCRIPTOR,
};
use crate::pipeline::module::synthesize_module;
use crate::pipeline::variants::{VariantGenerator, VariantSet};
use crate::token::VariantToken;

/// Import scheme that routes an image through the plugin.
pub const SCHEME: &str = "respimg+file:";

/// The responsive-image plugin.
pub struct ResponsiveImages {
    options: Options,
    codec: Arc<dyn ImageCodec>,
    generator: VariantGenerator,
}

impl ResponsiveImages {
    /// Plugin with the default `image`-crate codec.
    pub fn new(options: Options) -> Self {
        let codec: Arc<dyn ImageCodec> = Arc::new(RasterCodec::new(options.encoder.clone()));
        Self::with_codec(codec, options)
    }

    /// Plugin with a custom codec implementation.
    pub fn with_codec(codec: Arc<dyn ImageCodec>, options: Options) -> Self {
        Self {
            options,
            generator: VariantGenerator::new(codec.clone()),
            codec,
        }
    }

    /// Resolve hook. Dispatches on namespace, then on scheme.
    pub async fn resolve(&self, args: ResolveArgs, host: &dyn HostResolver) -> ResolveOutcome {
        if args.namespace == NAMESPACE_DESCRIPTOR {
            return self.resolve_variant(args);
        }
        if args.path.starts_with(SCHEME) {
            return self.resolve_entry(args, host).await;
        }
        ResolveOutcome::Ignored
    }

    /// Load hook. Dispatches on namespace.
    pub async fn load(&self, args: LoadArgs) -> LoadOutcome {
        match args.namespace.as_str() {
            NAMESPACE_DESCRIPTOR => self.load_descriptor(args).await,
            NAMESPACE_ASSET => Self::load_asset(args),
            _ => LoadOutcome::Ignored,
        }
    }

    /// Stage 1: decode the scheme specifier, let the host resolve the real
    /// file, re-tag into the descriptor namespace.
    async fn resolve_entry(&self, args: ResolveArgs, host: &dyn HostResolver) -> ResolveOutcome {
        let url = match Url::parse(&args.path) {
            Ok(url) => url,
            Err(e) => {
                return ResolveOutcome::error(format!(
                    "invalid {SCHEME} specifier '{}': {e}",
                    args.path
                ))
            }
        };

        let file_path = match percent_decode_str(url.path()).decode_utf8() {
            Ok(path) => path.into_owned(),
            Err(_) => {
                return ResolveOutcome::error(format!(
                    "specifier path is not valid UTF-8: '{}'",
                    args.path
                ))
            }
        };

        let params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let resolved = match host.resolve(&file_path, &args.resolve_dir).await {
            ResolveOutcome::Resolved(resolution) => resolution,
            ResolveOutcome::Errors(errors) => return ResolveOutcome::Errors(errors),
            ResolveOutcome::Ignored => {
                return ResolveOutcome::error(format!("host could not resolve '{file_path}'"))
            }
        };

        tracing::debug!(path = %resolved.path, "entry resolved into descriptor namespace");

        ResolveOutcome::Resolved(Resolution {
            watch_files: vec![PathBuf::from(&resolved.path)],
            path: resolved.path,
            namespace: NAMESPACE_DESCRIPTOR.to_string(),
            external: false,
            plugin_data: Some(PluginData::Descriptor(DescriptorRequest { params })),
        })
    }

    /// Stage 2: run the request pipeline and synthesize the module.
    async fn load_descriptor(&self, args: LoadArgs) -> LoadOutcome {
        let request = match args.plugin_data {
            Some(PluginData::Descriptor(request)) => request,
            _ => return LoadOutcome::error("invalid plugin data: expected a descriptor request"),
        };

        let spec = match RequestSpec::from_query(&request.params, self.options.display_width) {
            Ok(spec) => spec,
            Err(errors) => {
                return LoadOutcome::Errors(
                    errors.iter().map(|e| Message::new(e.to_string())).collect(),
                )
            }
        };

        match self.build_variant_set(Path::new(&args.path), &spec).await {
            Ok(set) => {
                let source = synthesize_module(&args.path, &set);
                LoadOutcome::Loaded(LoadedModule {
                    contents: source.into_bytes(),
                    loader: Loader::Js,
                    plugin_data: Some(PluginData::Variants(Arc::new(set))),
                })
            }
            Err(e) => LoadOutcome::error(e.to_string()),
        }
    }

    /// Read, guard and render one source image.
    async fn build_variant_set(
        &self,
        path: &Path,
        spec: &RequestSpec,
    ) -> Result<VariantSet, PipelineError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| PipelineError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let limits = &self.options.limits;
        if bytes.len() as u64 > limits.max_file_size_mb * 1024 * 1024 {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: bytes.len() as u64 / (1024 * 1024),
                max_mb: limits.max_file_size_mb,
            });
        }

        let metadata = self.codec.probe(&bytes).await?;
        if metadata.width > limits.max_source_dimension
            || metadata.height > limits.max_source_dimension
        {
            return Err(PipelineError::ImageTooLarge {
                path: path.to_path_buf(),
                width: metadata.width,
                height: metadata.height,
                max_dim: limits.max_source_dimension,
            });
        }

        if let (Some(declared), Some(actual)) = (spec.input_format, metadata.format) {
            if declared != actual {
                tracing::warn!(
                    declared = declared.as_str(),
                    actual = actual.as_str(),
                    "declared inputFormat does not match the source container"
                );
            }
        }

        self.generator.generate(&bytes, metadata, spec).await
    }

    /// Stage 3: decode a nested token import and re-tag it into the asset
    /// namespace, carrying that one variant's bytes.
    fn resolve_variant(&self, args: ResolveArgs) -> ResolveOutcome {
        let token = match VariantToken::decode(&args.path) {
            Ok(token) => token,
            Err(e) => return ResolveOutcome::error(e.to_string()),
        };

        let set = match &args.plugin_data {
            Some(PluginData::Variants(set)) => set,
            _ => return ResolveOutcome::error("invalid plugin data: expected a variant list"),
        };

        let variant = match set.variants.get(token.index) {
            Some(variant) => variant,
            None => {
                return ResolveOutcome::error(
                    TokenError::IndexOutOfBounds {
                        index: token.index,
                        len: set.variants.len(),
                    }
                    .to_string(),
                )
            }
        };

        ResolveOutcome::Resolved(Resolution {
            path: variant_asset_path(&token),
            namespace: NAMESPACE_ASSET.to_string(),
            external: false,
            watch_files: Vec::new(),
            plugin_data: Some(PluginData::Asset(variant.bytes.clone())),
        })
    }

    /// Stage 4 (terminal): hand the carried bytes to the host as-is.
    fn load_asset(args: LoadArgs) -> LoadOutcome {
        match args.plugin_data {
            Some(PluginData::Asset(bytes)) => LoadOutcome::Loaded(LoadedModule {
                contents: bytes,
                loader: Loader::File,
                plugin_data: None,
            }),
            _ => LoadOutcome::error("invalid plugin data: expected variant bytes"),
        }
    }
}

/// Final asset path: the source stem with `<size>.<format>` appended.
fn variant_asset_path(token: &VariantToken) -> String {
    let stem = match token.path.rfind('.') {
        Some(i) if i > 0 => &token.path[..i],
        _ => token.path.as_str(),
    };
    format!("{stem}.{}.{}", token.size, token.format.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SourceMetadata;
    use crate::format::ImageFormat;
    use crate::pipeline::variants::{FormatGroup, FormattedVariant};
    use async_trait::async_trait;

    struct RejectingHost;

    #[async_trait]
    impl HostResolver for RejectingHost {
        async fn resolve(&self, specifier: &str, _resolve_dir: &Path) -> ResolveOutcome {
            ResolveOutcome::error(format!("no such file: {specifier}"))
        }
    }

    struct EchoHost;

    #[async_trait]
    impl HostResolver for EchoHost {
        async fn resolve(&self, specifier: &str, resolve_dir: &Path) -> ResolveOutcome {
            ResolveOutcome::Resolved(Resolution {
                path: resolve_dir.join(specifier).to_string_lossy().into_owned(),
                namespace: "file".to_string(),
                external: false,
                watch_files: Vec::new(),
                plugin_data: None,
            })
        }
    }

    fn entry_args(path: &str) -> ResolveArgs {
        ResolveArgs {
            path: path.to_string(),
            namespace: String::new(),
            resolve_dir: PathBuf::from("/srv/site"),
            plugin_data: None,
        }
    }

    fn sample_set() -> Arc<VariantSet> {
        Arc::new(VariantSet {
            variants: vec![FormattedVariant {
                size: "200w".to_string(),
                format: ImageFormat::Png,
                bytes: vec![7, 7, 7],
                width: 200,
                height: 134,
            }],
            groups: vec![FormatGroup {
                format: ImageFormat::Png,
                members: vec![0],
            }],
            fallback: 0,
            source: SourceMetadata {
                width: 2000,
                height: 1333,
                format: Some(ImageFormat::Png),
            },
        })
    }

    #[tokio::test]
    async fn test_unrelated_specifiers_are_ignored() {
        let plugin = ResponsiveImages::new(Options::default());
        let outcome = plugin.resolve(entry_args("./style.css"), &EchoHost).await;
        assert!(matches!(outcome, ResolveOutcome::Ignored));
    }

    #[tokio::test]
    async fn test_entry_resolve_retags_and_attaches_query() {
        let plugin = ResponsiveImages::new(Options::default());
        let outcome = plugin
            .resolve(
                entry_args("respimg+file:./galaxy%20far.png?sizes=200w&displayWidth=800"),
                &EchoHost,
            )
            .await;

        let ResolveOutcome::Resolved(resolution) = outcome else {
            panic!("expected resolution, got {outcome:?}");
        };
        assert_eq!(resolution.namespace, NAMESPACE_DESCRIPTOR);
        assert!(resolution.path.ends_with("galaxy far.png"));
        assert_eq!(resolution.watch_files.len(), 1);

        let Some(PluginData::Descriptor(request)) = resolution.plugin_data else {
            panic!("expected descriptor plugin data");
        };
        assert_eq!(
            request.params,
            vec![
                ("sizes".to_string(), "200w".to_string()),
                ("displayWidth".to_string(), "800".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_entry_resolve_propagates_host_errors() {
        let plugin = ResponsiveImages::new(Options::default());
        let outcome = plugin
            .resolve(entry_args("respimg+file:./missing.png?sizes=1x"), &RejectingHost)
            .await;
        let ResolveOutcome::Errors(errors) = outcome else {
            panic!("expected errors");
        };
        assert!(errors[0].text.contains("missing.png"));
    }

    #[tokio::test]
    async fn test_descriptor_load_requires_descriptor_data() {
        let plugin = ResponsiveImages::new(Options::default());
        let outcome = plugin
            .load(LoadArgs {
                path: "/srv/site/galaxy.png".to_string(),
                namespace: NAMESPACE_DESCRIPTOR.to_string(),
                plugin_data: None,
            })
            .await;
        let LoadOutcome::Errors(errors) = outcome else {
            panic!("expected errors");
        };
        assert!(errors[0].text.contains("descriptor request"));
    }

    #[tokio::test]
    async fn test_variant_resolve_round_trip() {
        let plugin = ResponsiveImages::new(Options::default());
        let set = sample_set();
        let token = VariantToken {
            path: "/srv/site/galaxy.png".to_string(),
            index: 0,
            size: "200w".to_string(),
            format: ImageFormat::Png,
        };

        let outcome = plugin
            .resolve(
                ResolveArgs {
                    path: token.encode(),
                    namespace: NAMESPACE_DESCRIPTOR.to_string(),
                    resolve_dir: PathBuf::new(),
                    plugin_data: Some(PluginData::Variants(set)),
                },
                &EchoHost,
            )
            .await;

        let ResolveOutcome::Resolved(resolution) = outcome else {
            panic!("expected resolution, got {outcome:?}");
        };
        assert_eq!(resolution.namespace, NAMESPACE_ASSET);
        assert_eq!(resolution.path, "/srv/site/galaxy.200w.png");

        let loaded = plugin
            .load(LoadArgs {
                path: resolution.path,
                namespace: resolution.namespace,
                plugin_data: resolution.plugin_data,
            })
            .await;
        let LoadOutcome::Loaded(module) = loaded else {
            panic!("expected loaded asset");
        };
        assert_eq!(module.loader, Loader::File);
        assert_eq!(module.contents, vec![7, 7, 7]);
    }

    #[tokio::test]
    async fn test_variant_resolve_rejects_out_of_bounds_index() {
        let plugin = ResponsiveImages::new(Options::default());
        let token = VariantToken {
            path: "/srv/site/galaxy.png".to_string(),
            index: 9,
            size: "200w".to_string(),
            format: ImageFormat::Png,
        };

        let outcome = plugin
            .resolve(
                ResolveArgs {
                    path: token.encode(),
                    namespace: NAMESPACE_DESCRIPTOR.to_string(),
                    resolve_dir: PathBuf::new(),
                    plugin_data: Some(PluginData::Variants(sample_set())),
                },
                &EchoHost,
            )
            .await;

        let ResolveOutcome::Errors(errors) = outcome else {
            panic!("expected errors");
        };
        assert!(errors[0].text.contains("out of bounds"));
    }

    #[tokio::test]
    async fn test_variant_resolve_rejects_wrong_plugin_data() {
        let plugin = ResponsiveImages::new(Options::default());
        let token = VariantToken {
            path: "/srv/site/galaxy.png".to_string(),
            index: 0,
            size: "200w".to_string(),
            format: ImageFormat::Png,
        };

        let outcome = plugin
            .resolve(
                ResolveArgs {
                    path: token.encode(),
                    namespace: NAMESPACE_DESCRIPTOR.to_string(),
                    resolve_dir: PathBuf::new(),
                    plugin_data: Some(PluginData::Asset(vec![1])),
                },
                &EchoHost,
            )
            .await;

        let ResolveOutcome::Errors(errors) = outcome else {
            panic!("expected errors");
        };
        assert!(errors[0].text.contains("variant list"));
    }

    #[test]
    fn test_variant_asset_path_inserts_size_and_format() {
        let token = VariantToken {
            path: "/srv/site/galaxy.png".to_string(),
            index: 0,
            size: "0.25x".to_string(),
            format: ImageFormat::Webp,
        };
        assert_eq!(
            variant_asset_path(&token),
            "/srv/site/galaxy.0.25x.webp"
        );
    }

    #[test]
    fn test_variant_asset_path_without_extension() {
        let token = VariantToken {
            path: "galaxy".to_string(),
            index: 0,
            size: "200w".to_string(),
            format: ImageFormat::Png,
        };
        assert_eq!(variant_asset_path(&token), "galaxy.200w.png");
    }
}
