pub mod access;
#[cfg(feature = "cli")]
pub mod cli;
pub mod editor;
pub mod errors;
pub mod loader;

/// 启动 CLI 前端。
#[cfg(feature = "cli")]
pub async fn run_cli(
    config: &svgpad_config::AppConfig,
    options: cli::CliOptions,
) -> Result<(), errors::FrontendError> {
    tracing::info!(
        open = ?options.open,
        script = ?options.script,
        "启动 CLI 前端"
    );
    cli::run(config, options).await
}
