use proptest::prelude::*;

use wallfit::crop::{
    AxisMotion, CropDragController, CropModel, DragConstraints, DragStart, Handle, NormalizedRect,
    PointerSample,
};
use wallfit::geometry::{DisplayRect, Size, downscale_to_limits};
use wallfit::workflow::parse_dimension;

const EPS: f64 = 1e-6;

fn any_handle() -> impl Strategy<Value = Handle> {
    prop_oneof![
        Just(Handle::N),
        Just(Handle::S),
        Just(Handle::E),
        Just(Handle::W),
        Just(Handle::Ne),
        Just(Handle::Nw),
        Just(Handle::Se),
        Just(Handle::Sw),
    ]
}

fn any_rect() -> impl Strategy<Value = NormalizedRect> {
    (0.0..1.0f64, 0.0..1.0f64, 0.05..1.0f64, 0.05..1.0f64)
        .prop_map(|(x, y, width, height)| NormalizedRect::new(x, y, width, height))
}

fn crop_with(source: Size, rect: NormalizedRect) -> CropModel {
    let mut crop = CropModel::with_source(source);
    crop.set_rect(rect);
    crop
}

fn open_drag(
    crop: &CropModel,
    handle: Option<Handle>,
    locked_target: Option<Size>,
) -> CropDragController {
    let source = crop.source_size().expect("source");
    let mut controller = CropDragController::new();
    let started = controller.begin(
        crop,
        DragStart {
            pointer: PointerSample::new(1, 0.0, 0.0),
            button: Some(0),
            handle,
            image_rect: DisplayRect::new(0.0, 0.0, source.width as f64, source.height as f64),
        },
        DragConstraints {
            locked_target,
            min_edge: 48.0,
        },
    );
    assert!(started);
    controller
}

proptest! {
    #[test]
    fn clamped_rect_stays_in_unit_square(
        x in -2.0..2.0f64,
        y in -2.0..2.0f64,
        width in -1.0..3.0f64,
        height in -1.0..3.0f64,
    ) {
        let rect = NormalizedRect::new(x, y, width, height).clamped();
        prop_assert!(rect.width > 0.0 && rect.width <= 1.0);
        prop_assert!(rect.height > 0.0 && rect.height <= 1.0);
        prop_assert!(rect.x >= 0.0 && rect.x + rect.width <= 1.0 + EPS);
        prop_assert!(rect.y >= 0.0 && rect.y + rect.height <= 1.0 + EPS);
    }

    #[test]
    fn auto_crop_is_centered_and_maximal(
        source_w in 100u32..4000,
        source_h in 100u32..4000,
        target_w in 100u32..4000,
        target_h in 100u32..4000,
    ) {
        let mut crop = CropModel::with_source(Size::new(source_w, source_h));
        crop.auto_crop_for_target(target_w, target_h);
        let rect = crop.rect();

        prop_assert!((rect.width - 1.0).abs() < EPS || (rect.height - 1.0).abs() < EPS);
        prop_assert!((rect.x * 2.0 + rect.width - 1.0).abs() < EPS);
        prop_assert!((rect.y * 2.0 + rect.height - 1.0).abs() < EPS);

        let crop_ratio = (rect.width * source_w as f64) / (rect.height * source_h as f64);
        let target_ratio = target_w as f64 / target_h as f64;
        prop_assert!((crop_ratio / target_ratio - 1.0).abs() < 1e-6);
    }

    #[test]
    fn move_keeps_size_and_stays_inside(
        rect in any_rect(),
        dx in -10_000.0..10_000.0f64,
        dy in -10_000.0..10_000.0f64,
    ) {
        let crop = crop_with(Size::new(4000, 3000), rect);
        let controller = open_drag(&crop, None, None);
        let session = controller.session().expect("session");
        let start = session.start_rect;
        let moved = session.rect_for_pointer(dx, dy);

        prop_assert!((moved.width - start.width).abs() < EPS);
        prop_assert!((moved.height - start.height).abs() < EPS);
        prop_assert!(moved.x >= 0.0 && moved.right() <= 4000.0 + EPS);
        prop_assert!(moved.y >= 0.0 && moved.bottom() <= 3000.0 + EPS);
    }

    #[test]
    fn freeform_resize_keeps_the_opposite_edge(
        rect in any_rect(),
        handle in any_handle(),
        dx in -10_000.0..10_000.0f64,
        dy in -10_000.0..10_000.0f64,
    ) {
        let crop = crop_with(Size::new(4000, 3000), rect);
        let controller = open_drag(&crop, Some(handle), None);
        let session = controller.session().expect("session");
        let start = session.start_rect;
        let resized = session.rect_for_pointer(dx, dy);
        let descriptor = handle.descriptor();

        match descriptor.x {
            AxisMotion::Fixed => {
                prop_assert!((resized.x - start.x).abs() < EPS);
                prop_assert!((resized.width - start.width).abs() < EPS);
            }
            AxisMotion::Trailing => prop_assert!((resized.x - start.x).abs() < EPS),
            AxisMotion::Leading => prop_assert!((resized.right() - start.right()).abs() < EPS),
        }
        match descriptor.y {
            AxisMotion::Fixed => {
                prop_assert!((resized.y - start.y).abs() < EPS);
                prop_assert!((resized.height - start.height).abs() < EPS);
            }
            AxisMotion::Trailing => prop_assert!((resized.y - start.y).abs() < EPS),
            AxisMotion::Leading => prop_assert!((resized.bottom() - start.bottom()).abs() < EPS),
        }
    }

    #[test]
    fn locked_resize_keeps_the_target_ratio(
        rect in any_rect(),
        handle in any_handle(),
        target_w in 1u32..4000,
        target_h in 1u32..4000,
        dx in -10_000.0..10_000.0f64,
        dy in -10_000.0..10_000.0f64,
    ) {
        let crop = crop_with(Size::new(4000, 3000), rect);
        let controller = open_drag(&crop, Some(handle), Some(Size::new(target_w, target_h)));
        let session = controller.session().expect("session");
        let ratio = session.ratio.expect("locked");
        let resized = session.rect_for_pointer(dx, dy);

        prop_assert!(resized.width > 0.0 && resized.height > 0.0);
        prop_assert!((resized.width / resized.height / ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn applied_drag_never_leaves_the_source(
        rect in any_rect(),
        handle in proptest::option::of(any_handle()),
        locked in any::<bool>(),
        dx in -10_000.0..10_000.0f64,
        dy in -10_000.0..10_000.0f64,
    ) {
        let mut crop = crop_with(Size::new(1920, 1200), rect);
        let target = locked.then(|| Size::new(1080, 1920));
        let mut controller = open_drag(&crop, handle, target);

        prop_assert!(controller.update(&mut crop, PointerSample::new(1, dx, dy)));
        let pixels = crop.to_source_pixel_rect().expect("pixels");
        prop_assert!(pixels.width >= 1 && pixels.height >= 1);
        prop_assert!(pixels.x + pixels.width <= 1920);
        prop_assert!(pixels.y + pixels.height <= 1200);
    }

    #[test]
    fn downscale_respects_limits(
        width in 64u32..20_000,
        height in 64u32..20_000,
        max_dimension in 1024u32..10_000,
        max_pixels in 1_000_000u64..40_000_000,
    ) {
        let size = Size::new(width, height);
        let result = downscale_to_limits(size, max_dimension, max_pixels);

        prop_assert!(result.width <= width && result.height <= height);
        prop_assert!(result.width >= 1 && result.height >= 1);
        if result != size {
            prop_assert!(result.width <= max_dimension && result.height <= max_dimension);
            prop_assert!(result.pixel_count() as f64 <= max_pixels as f64 * (1.0 + 1e-9) + 1.0);
        }
    }

    #[test]
    fn dimension_parsing_reads_leading_digits(value in 1u32..=u32::MAX, suffix in "[a-z ]{0,4}") {
        prop_assert_eq!(parse_dimension(&format!("{}{}", value, suffix)), Some(value));
        prop_assert_eq!(parse_dimension(&format!("-{}", value)), None);
    }
}
