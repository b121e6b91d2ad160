use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Trawl API",
        version = "0.1.0",
        description = "Polite, bounded web crawling over HTTP."
    ),
    paths(
        crate::routes::crawl,
        crate::routes::scrape,
        crate::routes::links,
        crate::routes::create_run,
        crate::routes::get_run,
        crate::routes::get_run_pages,
        crate::routes::cancel_run,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::CrawlRequest,
        crate::dto::ScrapeRequest,
        crate::dto::LinksRequest,
        crate::dto::PageResponse,
        crate::dto::StatsResponse,
        crate::dto::CrawlResponse,
        crate::dto::LinksResponse,
        crate::dto::CreateRunResponse,
        crate::dto::RunStatus,
        crate::dto::RunResponse,
        crate::dto::RunPagesResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "crawl", description = "Synchronous crawl, scrape and link extraction"),
        (name = "runs", description = "Background crawl runs"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds Bearer token security scheme to the OpenAPI document.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("token")
                        .description(Some("API key. Set via TRAWL_API_KEY environment variable."))
                        .build(),
                ),
            );
        }
    }
}
