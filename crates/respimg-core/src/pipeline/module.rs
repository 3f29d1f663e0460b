//! Virtual module synthesis.
//!
//! The descriptor loader answers with JavaScript source: one import per
//! variant (through its variant token), metadata exports for the fallback
//! variant and the source image, and per-format srcset expressions. The
//! variant references are runtime values supplied by the host's asset
//! loader, so srcset strings are emitted as concatenation expressions.

use std::fmt::Write as _;

use crate::pipeline::variants::VariantSet;
use crate::token::VariantToken;

/// Render the virtual module source for `path`'s variant set.
pub fn synthesize_module(path: &str, set: &VariantSet) -> String {
    let mut source = String::new();

    for (index, variant) in set.variants.iter().enumerate() {
        let token = VariantToken {
            path: path.to_string(),
            index,
            size: variant.size.clone(),
            format: variant.format,
        };
        let _ = writeln!(
            source,
            "import _i{index}_ from {};",
            js_string(&token.encode())
        );
    }

    let fallback = set.fallback_variant();
    let _ = writeln!(source, "export const src = _i{}_;", set.fallback);
    let _ = writeln!(source, "export const width = {};", fallback.width);
    let _ = writeln!(source, "export const height = {};", fallback.height);
    let _ = writeln!(source, "export const originalWidth = {};", set.source.width);
    let _ = writeln!(
        source,
        "export const originalHeight = {};",
        set.source.height
    );

    let _ = writeln!(source, "export const sources = [");
    for group in &set.groups {
        let srcset = group
            .members
            .iter()
            .map(|&index| {
                format!(
                    "_i{index}_ + {}",
                    js_string(&format!(" {}", set.variants[index].size))
                )
            })
            .collect::<Vec<_>>()
            .join(" + \", \" + ");
        let _ = writeln!(
            source,
            "  [{}, {srcset}],",
            js_string(group.format.mime_type())
        );
    }
    let _ = writeln!(source, "];");

    source
}

/// JSON string serialization doubles as JavaScript string literal quoting.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
