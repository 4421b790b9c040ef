use std::fs;
use std::path::Path;

use crate::error::AppError;
use crate::workflow::WorkflowConfig;

/// Read a JSON settings file. Missing fields keep their defaults; the result
/// is validated before it is returned.
pub fn load_config_file(path: impl AsRef<Path>) -> Result<WorkflowConfig, AppError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)
        .map_err(|e| AppError::Settings(format!("{}: {}", path.display(), e)))?;
    log::info!("⚙️ settings loaded from {}", path.display());
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<WorkflowConfig, AppError> {
    let config = serde_json::from_str::<WorkflowConfig>(content)
        .map_err(|e| AppError::Settings(format!("failed to parse settings: {}", e)))?;
    config.validate()?;
    Ok(config)
}

/// Write `config` as pretty JSON.
pub fn save_config_file(path: impl AsRef<Path>, config: &WorkflowConfig) -> Result<(), AppError> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| AppError::Settings(format!("failed to serialize settings: {}", e)))?;
    fs::write(path, content)?;
    Ok(())
}
