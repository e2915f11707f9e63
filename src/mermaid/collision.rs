use log::trace;

use super::shapes::ShapePrimitive;

pub const MIN_VERTICAL_SPACING: f32 = 20.0;
pub const MIN_HORIZONTAL_SPACING: f32 = 30.0;

/// Push shapes that crowd their predecessor downwards.
///
/// Shapes are visited in (y, x) order of their centers. A shape closer than
/// both minimum spacings to the previous one (at that one's resolved position)
/// moves to sit exactly [`MIN_VERTICAL_SPACING`] below it. Only the immediate
/// predecessor is checked, so this is a single local pass, not a re-pack.
///
/// The result keeps the input order.
pub fn resolve(shapes: &[ShapePrimitive]) -> Vec<ShapePrimitive> {
    let mut resolved = shapes.to_vec();

    let mut order: Vec<usize> = (0..shapes.len()).collect();
    order.sort_by(|&a, &b| {
        let (ca, cb) = (shapes[a].center(), shapes[b].center());
        ca.y.total_cmp(&cb.y).then(ca.x.total_cmp(&cb.x))
    });

    for pair in order.windows(2) {
        let (prev, current) = (pair[0], pair[1]);
        let anchor = resolved[prev].center();
        let center = resolved[current].center();

        let dy = (center.y - anchor.y).abs();
        let dx = (center.x - anchor.x).abs();
        if dy < MIN_VERTICAL_SPACING && dx < MIN_HORIZONTAL_SPACING {
            let shape = &mut resolved[current];
            shape.bbox.y = anchor.y + MIN_VERTICAL_SPACING - shape.bbox.height / 2.0;
            trace!(node = shape.node_id.as_str(), dx = dx, dy = dy; "Moved crowded shape");
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mermaid::layout::{BBox, Point};
    use crate::mermaid::types::ShapeKind;

    fn shape_at(id: &str, x: f32, y: f32) -> ShapePrimitive {
        ShapePrimitive {
            node_id: id.to_string(),
            kind: ShapeKind::Rectangle,
            bbox: BBox::centered(Point::new(x, y), 120.0, 50.0),
        }
    }

    fn centers(shapes: &[ShapePrimitive]) -> Vec<(f32, f32)> {
        shapes.iter().map(|s| (s.center().x, s.center().y)).collect()
    }

    #[test]
    fn separated_shapes_are_untouched() {
        let shapes = vec![shape_at("A", 100.0, 80.0), shape_at("B", 300.0, 80.0)];
        assert_eq!(resolve(&shapes), shapes);
    }

    #[test]
    fn crowded_shape_moves_below_predecessor() {
        let shapes = vec![shape_at("A", 100.0, 80.0), shape_at("B", 110.0, 85.0)];
        assert_eq!(centers(&resolve(&shapes)), [(100.0, 80.0), (110.0, 100.0)]);
    }

    #[test]
    fn input_order_is_kept() {
        // B sorts first, but the output follows input order
        let shapes = vec![shape_at("A", 110.0, 85.0), shape_at("B", 100.0, 80.0)];
        let resolved = resolve(&shapes);
        assert_eq!(resolved[0].node_id, "A");
        assert_eq!(centers(&resolved), [(110.0, 100.0), (100.0, 80.0)]);
    }

    #[test]
    fn chain_uses_resolved_predecessor() {
        let shapes = vec![
            shape_at("A", 100.0, 80.0),
            shape_at("B", 100.0, 81.0),
            shape_at("C", 100.0, 82.0),
        ];
        let resolved = resolve(&shapes);
        assert_eq!(centers(&resolved), [(100.0, 80.0), (100.0, 100.0), (100.0, 120.0)]);
    }

    #[test]
    fn only_the_immediate_predecessor_is_checked() {
        // C is within threshold of A but not of its predecessor B, so it stays
        let shapes = vec![
            shape_at("A", 100.0, 80.0),
            shape_at("B", 200.0, 85.0),
            shape_at("C", 105.0, 90.0),
        ];
        let resolved = resolve(&shapes);
        assert_eq!(centers(&resolved), centers(&shapes));
    }

    #[test]
    fn empty_and_single_inputs() {
        assert!(resolve(&[]).is_empty());
        let one = vec![shape_at("A", 0.0, 0.0)];
        assert_eq!(resolve(&one), one);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;
        use proptest::test_runner::TestCaseError;

        fn arbitrary_shapes() -> impl Strategy<Value = Vec<ShapePrimitive>> {
            prop::collection::vec((0.0f32..200.0, 0.0f32..200.0), 0..16).prop_map(|points| {
                points
                    .into_iter()
                    .enumerate()
                    .map(|(i, (x, y))| shape_at(&format!("n{i}"), x, y))
                    .collect()
            })
        }

        fn check_adjacent_pairs_separated(shapes: &[ShapePrimitive]) -> Result<(), TestCaseError> {
            let resolved = resolve(shapes);
            prop_assert_eq!(resolved.len(), shapes.len());

            let mut order: Vec<usize> = (0..shapes.len()).collect();
            order.sort_by(|&a, &b| {
                let (ca, cb) = (shapes[a].center(), shapes[b].center());
                ca.y.total_cmp(&cb.y).then(ca.x.total_cmp(&cb.x))
            });

            for pair in order.windows(2) {
                let (a, b) = (resolved[pair[0]].center(), resolved[pair[1]].center());
                let crowded = (b.y - a.y).abs() < MIN_VERTICAL_SPACING - 1e-3
                    && (b.x - a.x).abs() < MIN_HORIZONTAL_SPACING;
                prop_assert!(!crowded, "{:?} and {:?} still crowd each other", a, b);
            }
            Ok(())
        }

        fn check_x_never_changes(shapes: &[ShapePrimitive]) -> Result<(), TestCaseError> {
            let resolved = resolve(shapes);
            for (before, after) in shapes.iter().zip(&resolved) {
                prop_assert_eq!(before.bbox.x, after.bbox.x);
                prop_assert_eq!(&before.node_id, &after.node_id);
            }
            Ok(())
        }

        proptest! {
            #[test]
            fn adjacent_shapes_are_separated(shapes in arbitrary_shapes()) {
                check_adjacent_pairs_separated(&shapes)?;
            }

            #[test]
            fn only_y_moves(shapes in arbitrary_shapes()) {
                check_x_never_changes(&shapes)?;
            }
        }
    }
}
