use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use ocrest::{build_router, config::Config, pipeline::Pipeline, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    #[cfg(feature = "ocr")]
    let filter: Arc<dyn ocrest::ocr::preprocess::ImageFilter> =
        Arc::new(ocrest::ocr::preprocess::RescaleFilter::new(
            config.filter_gain,
            config.filter_offset,
            config.filter_smoothing_radius,
        ));
    #[cfg(not(feature = "ocr"))]
    let filter: Arc<dyn ocrest::ocr::preprocess::ImageFilter> =
        Arc::new(ocrest::ocr::preprocess::NoopFilter);

    #[cfg(feature = "ocr")]
    let engine: Arc<dyn ocrest::ocr::OcrEngine> = Arc::new(ocrest::ocr::TesseractEngine::new(
        &config.ocr_language,
        config.ocr_timeout_seconds,
    ));
    #[cfg(not(feature = "ocr"))]
    let engine: Arc<dyn ocrest::ocr::OcrEngine> = Arc::new(ocrest::ocr::DisabledOcrEngine);

    #[cfg(feature = "pdf")]
    let renderer: Arc<dyn ocrest::pdf::PdfRenderer> =
        Arc::new(ocrest::pdf::PdfiumRenderer::new(config.pdf_render_width));
    #[cfg(not(feature = "pdf"))]
    let renderer: Arc<dyn ocrest::pdf::PdfRenderer> = Arc::new(ocrest::pdf::DisabledPdfRenderer);

    let pipeline = Pipeline::new(config.clone(), filter, engine, renderer);

    // Fail fast at startup if the upload tree cannot be created, instead of
    // on the first upload.
    pipeline.files().initialize_directory_structure().await?;

    let state = Arc::new(AppState {
        config: config.clone(),
        pipeline: Arc::new(pipeline),
    });

    let app = build_router(state)?;

    let listener = tokio::net::TcpListener::bind(&config.server_address).await?;
    info!("Server starting on {}", config.server_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
