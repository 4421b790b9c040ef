//! # wallfit: command line entry
//!
//! Loads one image, applies an optional preset / custom size / crop, runs a
//! single pass and writes the JPEG. Logic lives in the library; see `lib.rs`.
//!
//! ```text
//! wallfit photo.png --preset desktop:2560x1440
//! wallfit photo.png --size 1500x500 --crop 0,200,3000,1000 -o banner.jpg
//! wallfit --list-presets
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use wallfit::error::AppError;
use wallfit::geometry::PixelRect;
use wallfit::settings;
use wallfit::workflow::{
    FileInput, PassOutcome, PresetGroup, ViewportClass, WorkflowConfig, WorkflowService, catalog,
};

/// Crop and resize an image to a wallpaper / social size under a byte budget.
#[derive(Debug, Parser)]
#[command(name = "wallfit", author, version, about)]
struct CliArgs {
    /// Image to process.
    #[arg(required_unless_present = "list_presets")]
    input: Option<PathBuf>,

    /// Preset as GROUP:WxH, e.g. `desktop:1920x1080` or `social:2560x1440`.
    #[arg(long, value_name = "GROUP:WxH", conflicts_with = "size")]
    preset: Option<String>,

    /// Custom output size as WxH.
    #[arg(long, value_name = "WxH")]
    size: Option<String>,

    /// Crop in source pixels as x,y,width,height. Applied after the preset
    /// auto-crop.
    #[arg(long, value_name = "X,Y,W,H")]
    crop: Option<String>,

    /// Use the compact (mobile) output limits.
    #[arg(long)]
    compact: bool,

    /// JSON settings file; missing fields keep their defaults.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output path. Defaults to `<name>-<w>x<h>.jpg` in the current directory.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print the session snapshot as JSON after the pass.
    #[arg(long)]
    json: bool,

    /// Print the preset catalog and exit.
    #[arg(long)]
    list_presets: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CliArgs::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("❌ [{}] {}", err.code(), err);
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> Result<(), AppError> {
    if args.list_presets {
        print_presets();
        return Ok(());
    }

    let input = args
        .input
        .ok_or_else(|| AppError::Argument("an input image is required".to_string()))?;
    let config = match &args.config {
        Some(path) => settings::load_config_file(path)?,
        None => WorkflowConfig::default(),
    };
    let service = WorkflowService::native(config.clone(), ViewportClass::from_compact(args.compact))?;

    // Selection first, so the initial crop of the loaded source follows it.
    if let Some(preset) = &args.preset {
        let (group, key) = parse_preset_arg(preset)?;
        service.select_preset(group, Some(&key))?;
    }
    if let Some(size) = &args.size {
        let (width, height) = size
            .split_once(['x', 'X'])
            .ok_or_else(|| AppError::Argument(format!("size must be WxH: {}", size)))?;
        service.set_custom_inputs(width, height);
        service.apply_custom_size()?;
    }

    let file = FileInput::from_path(&input, config.max_upload_bytes)?;
    service.handle_file(file).await?;

    if let Some(crop) = &args.crop {
        service.set_crop_pixels(parse_crop_arg(crop)?);
    }

    let summary = match service.process_now().await {
        PassOutcome::Completed(summary) => summary,
        PassOutcome::Failed(report) => return Err(AppError::Render(report)),
        PassOutcome::Skipped { reason } => return Err(AppError::NoOutput(reason)),
    };
    let artifact = service
        .output()
        .ok_or_else(|| AppError::Argument("output was released before it could be written".to_string()))?;

    let output_path = match args.output {
        Some(path) => path,
        None => PathBuf::from(
            summary
                .download_name
                .clone()
                .unwrap_or_else(|| format!("wallfit-{}x{}.jpg", summary.width, summary.height)),
        ),
    };
    std::fs::write(&output_path, &artifact.bytes)?;

    for warning in &summary.warnings {
        log::warn!("⚠️ {}", warning);
    }
    log::info!(
        "💾 wrote {} ({}x{}, {}, q={:.0}%)",
        output_path.display(),
        summary.width,
        summary.height,
        summary.size_label,
        summary.quality * 100.0
    );

    if args.json {
        let snapshot = serde_json::to_string_pretty(&service.snapshot())
            .map_err(|e| AppError::Settings(format!("failed to serialize snapshot: {}", e)))?;
        println!("{}", snapshot);
    }

    service.reset_all();
    Ok(())
}

fn print_presets() {
    for group in PresetGroup::ALL {
        println!("{}:", group.as_str());
        for option in catalog().iter().filter(|option| option.group == group) {
            let template = option
                .template
                .map(|template| format!(" [{}]", template.as_str()))
                .unwrap_or_default();
            println!("  {:<12} {}{}", option.key, option.label, template);
        }
    }
}

fn parse_preset_arg(value: &str) -> Result<(PresetGroup, String), AppError> {
    let (group, key) = value
        .split_once(':')
        .ok_or_else(|| AppError::Argument(format!("preset must be GROUP:WxH: {}", value)))?;
    let group = PresetGroup::parse(group)
        .ok_or_else(|| AppError::Argument(format!("unknown preset group: {}", group)))?;
    Ok((group, key.trim().to_string()))
}

fn parse_crop_arg(value: &str) -> Result<PixelRect, AppError> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Argument(format!("crop must be x,y,w,h: {}", e)))?;

    match parts.as_slice() {
        [x, y, width, height] if *width > 0 && *height > 0 => {
            Ok(PixelRect::new(*x, *y, *width, *height))
        }
        _ => Err(AppError::Argument(format!(
            "crop must be four integers x,y,w,h with positive size: {}",
            value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_argument_parses() {
        let (group, key) = parse_preset_arg("Desktop:1920x1080").unwrap();
        assert_eq!(group, PresetGroup::Desktop);
        assert_eq!(key, "1920x1080");
        assert!(parse_preset_arg("tv:1x1").is_err());
        assert!(parse_preset_arg("1920x1080").is_err());
    }

    #[test]
    fn crop_argument_parses() {
        assert_eq!(
            parse_crop_arg("10, 20, 300, 400").unwrap(),
            PixelRect::new(10, 20, 300, 400)
        );
        assert!(parse_crop_arg("1,2,3").is_err());
        assert!(parse_crop_arg("1,2,0,4").is_err());
        assert!(parse_crop_arg("a,b,c,d").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        CliArgs::command().debug_assert();
    }
}
