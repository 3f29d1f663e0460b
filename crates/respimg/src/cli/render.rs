//! The `render` command: drive the full resolve/load protocol against the
//! local filesystem and write the results out.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::Args;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use respimg_core::{
    HostResolver, LoadArgs, LoadOutcome, Message, Options, PluginData, Resolution, ResolveArgs,
    ResolveOutcome, ResponsiveImages, VariantToken, NAMESPACE_DESCRIPTOR, SCHEME,
};

/// Bytes that would be misread as query/fragment markers in a specifier.
const PATH_SET: &AsciiSet = &CONTROLS.add(b' ').add(b'%').add(b'?').add(b'#').add(b'&');

/// Arguments for `respimg render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Source image
    pub input: PathBuf,

    /// Comma-separated size descriptors, e.g. `480w,800w` or `1x,2x`
    #[arg(long)]
    pub sizes: String,

    /// Comma-separated output formats (defaults to the source format)
    #[arg(long)]
    pub output_formats: Option<String>,

    /// Display width used to resolve density descriptors
    #[arg(long)]
    pub display_width: Option<u32>,

    /// Declared input format
    #[arg(long)]
    pub input_format: Option<String>,

    /// Output directory
    #[arg(short, long, default_value = "respimg-out")]
    pub out_dir: PathBuf,

    /// Optional respimg.toml with encoder and limit options
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Filesystem-backed stand-in for the host bundler's resolver.
struct LocalResolver;

#[async_trait]
impl HostResolver for LocalResolver {
    async fn resolve(&self, specifier: &str, resolve_dir: &Path) -> ResolveOutcome {
        let joined = if Path::new(specifier).is_absolute() {
            PathBuf::from(specifier)
        } else {
            resolve_dir.join(specifier)
        };
        match joined.canonicalize() {
            Ok(path) => ResolveOutcome::Resolved(Resolution {
                path: path.to_string_lossy().into_owned(),
                namespace: "file".to_string(),
                external: false,
                watch_files: Vec::new(),
                plugin_data: None,
            }),
            Err(e) => ResolveOutcome::error(format!("cannot resolve '{specifier}': {e}")),
        }
    }
}

/// Execute the render command.
pub async fn execute(args: RenderArgs) -> anyhow::Result<()> {
    let options = match &args.config {
        Some(path) => Options::load_from(path)
            .with_context(|| format!("loading options from {}", path.display()))?,
        None => Options::default(),
    };
    let plugin = ResponsiveImages::new(options);

    let specifier = build_specifier(&args);
    let resolve_dir = std::env::current_dir()?;
    tracing::debug!(%specifier, "rendering");

    // Stage 1: entry resolve
    let resolution = match plugin
        .resolve(
            ResolveArgs {
                path: specifier.clone(),
                namespace: String::new(),
                resolve_dir: resolve_dir.clone(),
                plugin_data: None,
            },
            &LocalResolver,
        )
        .await
    {
        ResolveOutcome::Resolved(resolution) => resolution,
        ResolveOutcome::Errors(errors) => bail!(join_messages(&errors)),
        ResolveOutcome::Ignored => bail!("specifier '{specifier}' was not claimed by the plugin"),
    };

    // Stage 2: descriptor load (validation + variant generation)
    let module = match plugin
        .load(LoadArgs {
            path: resolution.path.clone(),
            namespace: resolution.namespace.clone(),
            plugin_data: resolution.plugin_data,
        })
        .await
    {
        LoadOutcome::Loaded(module) => module,
        LoadOutcome::Errors(errors) => bail!(join_messages(&errors)),
        LoadOutcome::Ignored => bail!("descriptor load was ignored"),
    };

    let mut module_source =
        String::from_utf8(module.contents).context("module source is not UTF-8")?;
    let Some(PluginData::Variants(set)) = module.plugin_data else {
        bail!("descriptor load returned no variant data");
    };

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    // Stages 3+4 per variant: resolve the token, load the asset, write it
    for (index, variant) in set.variants.iter().enumerate() {
        let token = VariantToken {
            path: resolution.path.clone(),
            index,
            size: variant.size.clone(),
            format: variant.format,
        }
        .encode();

        let asset_resolution = match plugin
            .resolve(
                ResolveArgs {
                    path: token.clone(),
                    namespace: NAMESPACE_DESCRIPTOR.to_string(),
                    resolve_dir: resolve_dir.clone(),
                    plugin_data: Some(PluginData::Variants(set.clone())),
                },
                &LocalResolver,
            )
            .await
        {
            ResolveOutcome::Resolved(resolution) => resolution,
            ResolveOutcome::Errors(errors) => bail!(join_messages(&errors)),
            ResolveOutcome::Ignored => bail!("variant import was ignored: {token}"),
        };

        let asset = match plugin
            .load(LoadArgs {
                path: asset_resolution.path.clone(),
                namespace: asset_resolution.namespace.clone(),
                plugin_data: asset_resolution.plugin_data,
            })
            .await
        {
            LoadOutcome::Loaded(asset) => asset,
            LoadOutcome::Errors(errors) => bail!(join_messages(&errors)),
            LoadOutcome::Ignored => bail!("asset load was ignored: {token}"),
        };

        let file_name = Path::new(&asset_resolution.path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("variant.{index}"));
        let out_path = args.out_dir.join(&file_name);
        std::fs::write(&out_path, &asset.contents)
            .with_context(|| format!("writing {}", out_path.display()))?;

        tracing::info!(
            path = %out_path.display(),
            width = variant.width,
            height = variant.height,
            bytes = asset.contents.len(),
            "wrote variant"
        );

        // Point the module at the emitted file instead of the token
        module_source =
            module_source.replace(&format!("\"{token}\""), &format!("\"./{file_name}\""));
    }

    let stem = args
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let module_path = args.out_dir.join(format!("{stem}.respimg.js"));
    std::fs::write(&module_path, module_source)
        .with_context(|| format!("writing {}", module_path.display()))?;
    tracing::info!(
        path = %module_path.display(),
        variants = set.variants.len(),
        "wrote module"
    );

    Ok(())
}

/// Assemble the `respimg+file:` specifier from CLI flags.
fn build_specifier(args: &RenderArgs) -> String {
    let path = args.input.to_string_lossy();
    let mut specifier = format!("{SCHEME}{}", utf8_percent_encode(&path, PATH_SET));

    let mut params = vec![format!("sizes={}", args.sizes)];
    if let Some(formats) = &args.output_formats {
        params.push(format!("outputFormats={formats}"));
    }
    if let Some(width) = args.display_width {
        params.push(format!("displayWidth={width}"));
    }
    if let Some(format) = &args.input_format {
        params.push(format!("inputFormat={format}"));
    }

    specifier.push('?');
    specifier.push_str(&params.join("&"));
    specifier
}

fn join_messages(errors: &[Message]) -> String {
    errors
        .iter()
        .map(|m| m.text.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_args(input: &str, sizes: &str) -> RenderArgs {
        RenderArgs {
            input: PathBuf::from(input),
            sizes: sizes.to_string(),
            output_formats: None,
            display_width: None,
            input_format: None,
            out_dir: PathBuf::from("respimg-out"),
            config: None,
        }
    }

    #[test]
    fn test_build_specifier_minimal() {
        let args = render_args("./photo.jpg", "480w,800w");
        assert_eq!(
            build_specifier(&args),
            "respimg+file:./photo.jpg?sizes=480w,800w"
        );
    }

    #[test]
    fn test_build_specifier_escapes_path() {
        let args = render_args("./my photo.jpg", "1x");
        assert_eq!(
            build_specifier(&args),
            "respimg+file:./my%20photo.jpg?sizes=1x"
        );
    }

    #[test]
    fn test_build_specifier_full() {
        let mut args = render_args("hero.png", "1x,2x");
        args.output_formats = Some("webp,jpeg".to_string());
        args.display_width = Some(1280);
        args.input_format = Some("png".to_string());
        assert_eq!(
            build_specifier(&args),
            "respimg+file:hero.png?sizes=1x,2x&outputFormats=webp,jpeg&displayWidth=1280&inputFormat=png"
        );
    }

    #[tokio::test]
    async fn test_local_resolver_rejects_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = LocalResolver.resolve("missing.png", dir.path()).await;
        assert!(matches!(outcome, ResolveOutcome::Errors(_)));
    }

    #[tokio::test]
    async fn test_render_writes_assets_and_module() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("galaxy.png");
        image::DynamicImage::new_rgb8(400, 260)
            .save_with_format(&input, image::ImageFormat::Png)
            .unwrap();

        let mut args = render_args(input.to_str().unwrap(), "100w,200w");
        args.out_dir = dir.path().join("out");
        execute(args).await.unwrap();

        assert!(dir.path().join("out/galaxy.100w.png").exists());
        assert!(dir.path().join("out/galaxy.200w.png").exists());

        let module = std::fs::read_to_string(dir.path().join("out/galaxy.respimg.js")).unwrap();
        assert!(module.contains("import _i0_ from \"./galaxy.100w.png\";"));
        assert!(module.contains("export const originalWidth = 400;"));
    }
}
