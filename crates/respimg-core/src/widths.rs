//! Width resolution: size descriptors to concrete render targets.

use crate::descriptor::{DescriptorKind, SizeDescriptor};
use crate::error::PipelineError;

/// A size descriptor resolved to the pixel width it will be rendered at.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedWidth {
    pub descriptor: SizeDescriptor,
    pub width: u32,
}

/// Resolve sorted descriptors into render targets.
///
/// Width descriptors map to their literal pixel value, density descriptors
/// to `round(factor * display_width)`. The first descriptor whose computed
/// width reaches the source's native width is clamped to the native width;
/// every later descriptor is dropped, since it would render the same
/// clamped image again.
pub fn plan_widths(
    sizes: &[SizeDescriptor],
    display_width: u32,
    native_width: u32,
) -> Result<Vec<PlannedWidth>, PipelineError> {
    let mut planned = Vec::with_capacity(sizes.len());
    let mut clamped = false;

    for descriptor in sizes {
        let width = match descriptor.kind() {
            DescriptorKind::Width(pixels) => pixels,
            DescriptorKind::Density(factor) => {
                let computed = (factor * f64::from(display_width)).round();
                if !computed.is_finite() || computed < 1.0 || computed > f64::from(u32::MAX) {
                    return Err(PipelineError::InvalidWidth {
                        token: descriptor.text().to_string(),
                    });
                }
                computed as u32
            }
        };

        if width >= native_width {
            if !clamped {
                clamped = true;
                planned.push(PlannedWidth {
                    descriptor: descriptor.clone(),
                    width: native_width,
                });
            }
            continue;
        }

        planned.push(PlannedWidth {
            descriptor: descriptor.clone(),
            width,
        });
    }

    Ok(planned)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptors(tokens: &[&str]) -> Vec<SizeDescriptor> {
        tokens
            .iter()
            .map(|t| SizeDescriptor::parse(t).unwrap())
            .collect()
    }

    #[test]
    fn test_width_descriptors_are_literal() {
        let plan = plan_widths(&descriptors(&["200w", "400w"]), 1024, 2000).unwrap();
        let widths: Vec<u32> = plan.iter().map(|p| p.width).collect();
        assert_eq!(widths, vec![200, 400]);
    }

    #[test]
    fn test_density_descriptors_scale_display_width() {
        let plan = plan_widths(&descriptors(&["0.25x", "0.5x", "1x"]), 1024, 2000).unwrap();
        let widths: Vec<u32> = plan.iter().map(|p| p.width).collect();
        assert_eq!(widths, vec![256, 512, 1024]);
    }

    #[test]
    fn test_density_rounds_to_nearest() {
        // 1.5 * 333 = 499.5, rounds to 500
        let plan = plan_widths(&descriptors(&["1.5x"]), 333, 2000).unwrap();
        assert_eq!(plan[0].width, 500);
    }

    #[test]
    fn test_first_oversize_descriptor_clamps_to_native() {
        let plan = plan_widths(&descriptors(&["200w", "3000w"]), 1024, 2000).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].width, 2000);
        assert_eq!(plan[1].descriptor.text(), "3000w");
    }

    #[test]
    fn test_later_oversize_descriptors_are_dropped() {
        let plan = plan_widths(
            &descriptors(&["200w", "2000w", "3000w", "4000w"]),
            1024,
            2000,
        )
        .unwrap();
        let texts: Vec<&str> = plan.iter().map(|p| p.descriptor.text()).collect();
        assert_eq!(texts, vec!["200w", "2000w"]);
        assert_eq!(plan[1].width, 2000);
    }

    #[test]
    fn test_all_oversize_keeps_only_first() {
        let plan = plan_widths(&descriptors(&["3000w", "5000w"]), 1024, 2000).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].width, 2000);
        assert_eq!(plan[0].descriptor.text(), "3000w");
    }

    #[test]
    fn test_huge_density_is_an_error() {
        let sizes = descriptors(&["99999999999999999999x"]);
        let result = plan_widths(&sizes, u32::MAX, u32::MAX);
        assert!(matches!(
            result,
            Err(PipelineError::InvalidWidth { token }) if token == "99999999999999999999x"
        ));
    }
}
