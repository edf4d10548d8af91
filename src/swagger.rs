use axum::Router;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{GreetingResponse, RecognitionResponse},
    AppState,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::read::greeting,
        crate::routes::read::read_unified,
        crate::routes::read::read_image,
        crate::routes::read::read_file,
    ),
    components(schemas(RecognitionResponse, GreetingResponse)),
    tags(
        (name = "read", description = "Text recognition endpoints"),
    ),
    info(
        title = "ocrest API",
        version = "0.1.0",
        description = "Image and PDF text recognition service"
    )
)]
pub struct ApiDoc;

pub fn create_swagger_router() -> Router<Arc<AppState>> {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}
