use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use image::DynamicImage;
use wallfit::crop::{DragStart, Handle, NormalizedRect, PointerSample};
use wallfit::geometry::{DisplayRect, PixelRect, Size};
use wallfit::workflow::{
    COMPACT_HIGH_RES_WARNING, FileInput, ImageHost, InMemoryHandles, OutputFormat, PixelBuffer,
    PresetGroup, ResampleFilter, StatusTone, Surface, TargetSelection, WorkflowConfig,
    WorkflowError, WorkflowService,
};

const MB: usize = 1024 * 1024;

type EncodeSize = Box<dyn Fn(Size, f64) -> usize + Send + Sync>;

/// Host whose "files" are `WxH` strings and whose encoder returns buffers of
/// a scripted length.
struct ScriptedHost {
    compact: bool,
    encode_size: EncodeSize,
    encode_delay: Duration,
    rasterized: Mutex<Vec<(Option<PixelRect>, Size)>>,
    qualities: Mutex<Vec<f64>>,
    passes: AtomicUsize,
    decodes: AtomicUsize,
}

impl ScriptedHost {
    fn new(encode_size: impl Fn(Size, f64) -> usize + Send + Sync + 'static) -> Self {
        Self {
            compact: false,
            encode_size: Box::new(encode_size),
            encode_delay: Duration::ZERO,
            rasterized: Mutex::new(Vec::new()),
            qualities: Mutex::new(Vec::new()),
            passes: AtomicUsize::new(0),
            decodes: AtomicUsize::new(0),
        }
    }

    fn small() -> Self {
        Self::new(|_, _| 1024)
    }

    fn compact(mut self) -> Self {
        self.compact = true;
        self
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.encode_delay = delay;
        self
    }

    fn passes(&self) -> usize {
        self.passes.load(Ordering::SeqCst)
    }

    fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    fn last_raster(&self) -> Option<(Option<PixelRect>, Size)> {
        self.rasterized.lock().unwrap().last().copied()
    }

    fn qualities(&self) -> Vec<f64> {
        self.qualities.lock().unwrap().clone()
    }
}

impl ImageHost for ScriptedHost {
    fn probe_size(&self, bytes: &[u8]) -> Result<Size, WorkflowError> {
        let text = std::str::from_utf8(bytes).map_err(|e| WorkflowError::Decode(e.to_string()))?;
        Size::parse_key(text.trim())
            .ok_or_else(|| WorkflowError::Decode(format!("not a size: {}", text)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Surface, WorkflowError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        let size = self.probe_size(bytes)?;
        Ok(Surface::new(DynamicImage::new_luma8(size.width, size.height)))
    }

    fn rasterize(
        &self,
        _surface: &Surface,
        region: Option<PixelRect>,
        size: Size,
        _filter: ResampleFilter,
    ) -> Result<PixelBuffer, WorkflowError> {
        self.passes.fetch_add(1, Ordering::SeqCst);
        self.rasterized.lock().unwrap().push((region, size));
        Ok(PixelBuffer {
            size,
            image: DynamicImage::new_luma8(1, 1),
        })
    }

    fn encode(
        &self,
        pixels: &PixelBuffer,
        _format: OutputFormat,
        quality: f64,
    ) -> Result<Vec<u8>, WorkflowError> {
        if !self.encode_delay.is_zero() {
            std::thread::sleep(self.encode_delay);
        }
        self.qualities.lock().unwrap().push(quality);
        Ok(vec![0u8; (self.encode_size)(pixels.size, quality)])
    }

    fn is_compact_viewport(&self) -> bool {
        self.compact
    }
}

fn fast_config() -> WorkflowConfig {
    WorkflowConfig {
        debounce_ms: 20,
        ..WorkflowConfig::default()
    }
}

fn service_with(
    host: Arc<ScriptedHost>,
    config: WorkflowConfig,
) -> (Arc<WorkflowService>, Arc<InMemoryHandles>) {
    let handles = Arc::new(InMemoryHandles::new());
    let service = WorkflowService::new(config, host, handles.clone()).expect("valid config");
    (service, handles)
}

fn image_file(name: &str, width: u32, height: u32) -> FileInput {
    FileInput::from_bytes(name, Some("image/png"), format!("{}x{}", width, height).into_bytes())
}

async fn wait_idle(service: &Arc<WorkflowService>) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while service.is_busy() {
        assert!(Instant::now() < deadline, "workflow did not settle");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn wait_processing(service: &Arc<WorkflowService>) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !service.snapshot().processing {
        assert!(Instant::now() < deadline, "pass never started");
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[tokio::test]
async fn preset_on_landscape_source_crops_full_width() {
    let host = Arc::new(ScriptedHost::small());
    let (service, _) = service_with(host.clone(), fast_config());

    service.handle_file(image_file("landscape.png", 4000, 3000)).await.unwrap();
    service
        .select_preset(PresetGroup::Desktop, Some("1920x1080"))
        .unwrap();
    wait_idle(&service).await;

    let snapshot = service.snapshot();
    assert_eq!(snapshot.crop_pixels, Some(PixelRect::new(0, 375, 4000, 2250)));
    assert_eq!(
        host.last_raster(),
        Some((Some(PixelRect::new(0, 375, 4000, 2250)), Size::new(1920, 1080)))
    );

    let output = snapshot.output.expect("output published");
    assert_eq!((output.width, output.height), (1920, 1080));
    assert_eq!(output.quality, 0.9);
    assert!(output.bytes <= WorkflowConfig::default().max_output_bytes);
    assert_eq!(snapshot.status.tone, StatusTone::Ready);
    assert_eq!(host.passes(), 1);
}

#[tokio::test]
async fn custom_square_on_portrait_source() {
    let host = Arc::new(ScriptedHost::small());
    let (service, _) = service_with(host.clone(), fast_config());

    service.handle_file(image_file("holiday.png", 50, 200)).await.unwrap();
    assert!(service.set_custom_inputs("100", "100"));
    service.apply_custom_size().unwrap();
    wait_idle(&service).await;

    let snapshot = service.snapshot();
    assert_eq!(snapshot.crop_pixels, Some(PixelRect::new(0, 75, 50, 50)));
    assert_eq!(
        snapshot.selection,
        TargetSelection::Custom {
            size: Size::new(100, 100)
        }
    );
    let output = snapshot.output.expect("output published");
    assert_eq!((output.width, output.height), (100, 100));
    assert_eq!(
        service.download_file_name().as_deref(),
        Some("holiday-100x100.jpg")
    );
}

#[tokio::test]
async fn locked_corner_drag_clamps_to_source() {
    let host = Arc::new(ScriptedHost::small());
    let (service, _) = service_with(host, fast_config());

    service.handle_file(image_file("wide.png", 4000, 3000)).await.unwrap();
    service
        .select_preset(PresetGroup::Desktop, Some("1920x1080"))
        .unwrap();
    service.set_crop_pixels(PixelRect::new(1000, 1000, 1600, 900));

    let start = DragStart {
        pointer: PointerSample::new(7, 0.0, 0.0),
        button: Some(0),
        handle: Some(Handle::Se),
        image_rect: DisplayRect::new(0.0, 0.0, 4000.0, 3000.0),
    };
    assert!(service.begin_crop_drag(start).unwrap());
    assert!(service.update_crop_drag(PointerSample::new(7, 10_000.0, 10_000.0)));
    assert!(service.end_crop_drag(7));
    wait_idle(&service).await;

    let rect = service.snapshot().crop_pixels.expect("crop");
    assert_eq!((rect.x, rect.y), (1000, 1000));
    assert_eq!(rect.width, 3000);
    assert!((1687..=1688).contains(&rect.height), "height {}", rect.height);
}

#[tokio::test]
async fn budget_search_fails_at_quality_floor() {
    let host = Arc::new(ScriptedHost::new(|_, _| 22 * MB));
    let config = WorkflowConfig {
        max_output_bytes: 18 * MB as u64,
        ..fast_config()
    };
    let (service, handles) = service_with(host.clone(), config);

    service.handle_file(image_file("big.png", 2000, 1000)).await.unwrap();
    wait_idle(&service).await;

    let expected = [0.9, 0.83, 0.76, 0.69, 0.62, 0.6];
    let qualities = host.qualities();
    assert_eq!(qualities.len(), expected.len());
    for (actual, expected) in qualities.iter().zip(expected) {
        assert!((actual - expected).abs() < 1e-9, "{} vs {}", actual, expected);
    }

    let snapshot = service.snapshot();
    assert!(snapshot.output.is_none());
    assert_eq!(snapshot.status.tone, StatusTone::Error);
    assert_eq!(snapshot.status.code, Some("E_BUDGET_EXCEEDED"));
    assert_eq!(
        snapshot.status.message,
        "Output exceeds 18 MB at minimum quality. Try a smaller resolution."
    );
    // only the preview handle is live
    assert_eq!(handles.live_count(), 1);
}

#[tokio::test]
async fn reduced_quality_is_reported_as_warning() {
    // Over budget until quality drops to 0.76.
    let host = Arc::new(ScriptedHost::new(|_, quality| if quality > 0.8 { 20 * MB } else { 5 * MB }));
    let (service, _) = service_with(host, fast_config());

    service.handle_file(image_file("a.png", 800, 600)).await.unwrap();
    wait_idle(&service).await;

    let snapshot = service.snapshot();
    assert_eq!(snapshot.status.tone, StatusTone::Warn);
    assert_eq!(
        snapshot.status.message,
        "Quality adjusted to 76% to stay under 15 MB."
    );
    let output = snapshot.output.expect("output published");
    assert!((output.quality - 0.76).abs() < 1e-9);
}

#[tokio::test]
async fn burst_of_changes_runs_one_pass() {
    let host = Arc::new(ScriptedHost::small());
    let (service, _) = service_with(host.clone(), fast_config());

    service.handle_file(image_file("a.png", 1000, 1000)).await.unwrap();
    for step in 0..5 {
        let offset = step as f64 * 0.01;
        service.set_crop(NormalizedRect::new(offset, offset, 0.5, 0.5));
    }
    wait_idle(&service).await;

    assert_eq!(host.passes(), 1);
    assert_eq!(
        host.last_raster().map(|(region, _)| region),
        Some(Some(PixelRect::new(40, 40, 500, 500)))
    );
}

#[tokio::test]
async fn changes_during_a_pass_collapse_into_one_follow_up() {
    let host = Arc::new(ScriptedHost::small().slow(Duration::from_millis(150)));
    let (service, _) = service_with(host.clone(), fast_config());

    service.handle_file(image_file("a.png", 1000, 1000)).await.unwrap();
    wait_processing(&service).await;

    service.set_crop(NormalizedRect::new(0.0, 0.0, 0.5, 0.5));
    service.set_crop(NormalizedRect::new(0.1, 0.1, 0.5, 0.5));
    service.set_crop(NormalizedRect::new(0.2, 0.2, 0.5, 0.5));
    assert!(service.snapshot().pending);
    wait_idle(&service).await;

    assert_eq!(host.passes(), 2);
    assert_eq!(
        host.last_raster().map(|(region, _)| region),
        Some(Some(PixelRect::new(200, 200, 500, 500)))
    );
}

#[tokio::test]
async fn compact_viewport_clamps_and_warns() {
    let host = Arc::new(ScriptedHost::small().compact());
    let (service, _) = service_with(host.clone(), fast_config());

    service.handle_file(image_file("a.png", 5120, 2880)).await.unwrap();
    service
        .select_preset(PresetGroup::Desktop, Some("5120x2880"))
        .unwrap();
    wait_idle(&service).await;

    assert_eq!(
        host.last_raster().map(|(_, size)| size),
        Some(Size::new(4096, 2304))
    );
    let snapshot = service.snapshot();
    assert_eq!(snapshot.status.tone, StatusTone::Warn);
    assert_eq!(snapshot.status.message, COMPACT_HIGH_RES_WARNING);
}

#[tokio::test]
async fn rejected_uploads_leave_no_source() {
    let host = Arc::new(ScriptedHost::small());
    let (service, handles) = service_with(host.clone(), fast_config());

    let text = FileInput::from_bytes("notes.txt", Some("text/plain"), b"1x1".to_vec());
    assert!(matches!(
        service.handle_file(text).await,
        Err(WorkflowError::InvalidFileType { .. })
    ));
    assert_eq!(service.snapshot().status.message, "Please upload a valid image file.");

    let huge = image_file("huge.png", 6000, 4000);
    assert!(matches!(
        service.handle_file(huge).await,
        Err(WorkflowError::ResolutionTooHigh { .. })
    ));
    let snapshot = service.snapshot();
    assert!(snapshot.file.is_none());
    assert!(snapshot.source_size.is_none());
    assert_eq!(snapshot.status.code, Some("E_RESOLUTION_TOO_HIGH"));
    assert_eq!(
        snapshot.status.message,
        "Image resolution is too high. Try a smaller image (max 5120 × 2880)."
    );
    assert_eq!(handles.live_count(), 0);
    assert_eq!(host.decodes(), 0, "oversized source must be rejected from its header");

    wait_idle(&service).await;
    assert_eq!(host.passes(), 0);
}

/// PNG declaring a 12000x12000 RGBA image followed by a truncated pixel
/// stream. Decoding it in full would need 576,000,000 bytes.
const OVERSIZED_PNG_HEADER: [u8; 59] = [
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, // signature
    0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52, // IHDR
    0x00, 0x00, 0x2e, 0xe0, 0x00, 0x00, 0x2e, 0xe0, // 12000 x 12000
    0x08, 0x06, 0x00, 0x00, 0x00, 0x51, 0x45, 0x8c, 0xf1, // 8-bit RGBA, crc
    0x00, 0x00, 0x00, 0x02, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x62, 0xa4, 0x91,
    0x2b, // IDAT
    0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82, // IEND
];

#[tokio::test]
async fn native_host_rejects_oversized_source_before_decoding() {
    let service = WorkflowService::native(fast_config(), Default::default()).unwrap();
    let file = FileInput::from_bytes("big.png", Some("image/png"), OVERSIZED_PNG_HEADER.to_vec());

    let err = service.handle_file(file).await.unwrap_err();
    assert!(
        matches!(
            err,
            WorkflowError::ResolutionTooHigh {
                width: 12000,
                height: 12000,
                max_width: 5120,
                max_height: 2880,
            }
        ),
        "unexpected error: {:?}",
        err
    );

    let snapshot = service.snapshot();
    assert!(snapshot.source_size.is_none());
    assert_eq!(snapshot.status.code, Some("E_RESOLUTION_TOO_HIGH"));
}

#[tokio::test]
async fn configured_upload_cap_drives_rejection() {
    let host = Arc::new(ScriptedHost::small());
    let config = WorkflowConfig {
        max_upload_resolution: Size::new(1920, 1080),
        ..fast_config()
    };
    let (service, _) = service_with(host.clone(), config);

    let err = service
        .handle_file(image_file("wide.png", 2560, 1440))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Image resolution is too high. Try a smaller image (max 1920 × 1080)."
    );

    service.handle_file(image_file("ok.png", 1080, 1920)).await.unwrap();
    assert_eq!(service.snapshot().source_size, Some(Size::new(1080, 1920)));
    assert_eq!(host.decodes(), 1);
}

#[tokio::test]
async fn undecodable_file_reports_load_error() {
    let host = Arc::new(ScriptedHost::small());
    let (service, _) = service_with(host, fast_config());

    let broken = FileInput::from_bytes("broken.png", Some("image/png"), b"garbage".to_vec());
    assert!(matches!(
        service.handle_file(broken).await,
        Err(WorkflowError::Decode(_))
    ));
    let snapshot = service.snapshot();
    assert_eq!(
        snapshot.status.message,
        "Could not load this image. Try a different file."
    );
    assert!(snapshot.file.is_some());
    assert!(snapshot.source_size.is_none());
}

#[tokio::test]
async fn reset_releases_every_handle() {
    let host = Arc::new(ScriptedHost::small());
    let (service, handles) = service_with(host, fast_config());

    service.handle_file(image_file("a.png", 640, 480)).await.unwrap();
    wait_idle(&service).await;
    assert_eq!(handles.live_count(), 2);

    service.reset_all();
    let snapshot = service.snapshot();
    assert_eq!(handles.live_count(), 0);
    assert!(snapshot.output.is_none());
    assert!(snapshot.file.is_none());
    assert_eq!(snapshot.crop, NormalizedRect::FULL);
    assert_eq!(snapshot.preview_label, None);
}

#[tokio::test]
async fn preset_selected_before_load_shapes_initial_crop() {
    let host = Arc::new(ScriptedHost::small());
    let (service, _) = service_with(host, fast_config());

    service
        .select_preset(PresetGroup::Social, Some("2560x1440"))
        .unwrap();
    service.handle_file(image_file("banner.png", 2560, 1440)).await.unwrap();

    let snapshot = service.snapshot();
    // auto-crop covers the full source, then the template inset shrinks it
    let crop = snapshot.crop;
    assert!((crop.x - 0.04).abs() < 1e-9);
    assert!((crop.width - 0.92).abs() < 1e-9);
    assert_eq!(
        snapshot.preview_label.as_deref(),
        Some("Crop · 2560 × 1440px")
    );
    wait_idle(&service).await;
}

#[tokio::test]
async fn native_host_end_to_end() {
    let mut buffer = std::io::Cursor::new(Vec::new());
    image::ImageBuffer::from_fn(320, 200, |x, y| image::Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
        .write_to(&mut buffer, image::ImageFormat::Png)
        .expect("png encode");

    let service = WorkflowService::native(fast_config(), Default::default()).unwrap();
    let file = FileInput::from_bytes("gradient.png", None, buffer.into_inner());
    service.handle_file(file).await.unwrap();
    service.set_custom_inputs("160", "90");
    service.apply_custom_size().unwrap();

    let outcome = service.process_now().await;
    let summary = match outcome {
        wallfit::workflow::PassOutcome::Completed(summary) => summary,
        other => panic!("unexpected outcome: {:?}", other),
    };
    assert_eq!((summary.width, summary.height), (160, 90));

    let artifact = service.output().expect("artifact");
    let decoded = image::load_from_memory(&artifact.bytes).expect("valid jpeg");
    assert_eq!((decoded.width(), decoded.height()), (160, 90));
    assert_eq!(
        summary.download_name.as_deref(),
        Some("gradient-160x90.jpg")
    );
}
