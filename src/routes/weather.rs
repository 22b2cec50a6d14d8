use actix_web::{http::header::ContentType, post, web, HttpResponse, Responder};
use serde::Deserialize;

use crate::{
    config::Config,
    error::AppError,
    weather::{self, WeatherCache},
};

#[derive(Debug, Deserialize)]
pub struct WeatherRequest {
    pub city: String,
}

/// Look up current weather for a city
///
/// Responses are cached per normalized city name for a fixed window, and a
/// cache hit replays the stored body byte for byte.
#[post("/weather/")]
pub async fn weather_lookup(
    config: web::Data<Config>,
    client: web::Data<reqwest::Client>,
    cache: web::Data<WeatherCache>,
    weather_data: web::Json<WeatherRequest>,
) -> Result<impl Responder, AppError> {
    let city = weather::normalize_city(&weather_data.city);
    if city.is_empty() {
        return Err(AppError::Validation("city must not be empty".into()));
    }

    if let Some(cached) = cache.get(&city) {
        return Ok(HttpResponse::Ok()
            .content_type(ContentType::json())
            .body(cached));
    }

    let summary = weather::lookup(&client, &config, &city).await?;
    let body = summary.to_string();
    cache.store(&city, body.clone());

    Ok(HttpResponse::Ok()
        .content_type(ContentType::json())
        .body(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;
    use serde_json::json;
    use std::env;

    fn test_config() -> Config {
        env::set_var("DATABASE_URL", "postgres://test");
        env::set_var("JWT_SECRET", "weather-test-secret");
        Config::from_env()
    }

    #[actix_rt::test]
    async fn test_blank_city_is_rejected() {
        let app = test::init_service(
            actix_web::App::new()
                .app_data(web::Data::new(test_config()))
                .app_data(web::Data::new(reqwest::Client::new()))
                .app_data(web::Data::new(WeatherCache::new()))
                .service(weather_lookup),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/weather/")
            .set_json(json!({ "city": "   " }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_rt::test]
    async fn test_cache_hit_replays_stored_body_without_an_upstream_call() {
        let cache = WeatherCache::new();
        cache.store("tehran", r#"{"weather":"clear sky","temp":31.2}"#.to_string());

        let app = test::init_service(
            actix_web::App::new()
                .app_data(web::Data::new(test_config()))
                .app_data(web::Data::new(reqwest::Client::new()))
                .app_data(web::Data::new(cache))
                .service(weather_lookup),
        )
        .await;

        // Mixed case and padding still hit the same cache slot.
        let req = test::TestRequest::post()
            .uri("/weather/")
            .set_json(json!({ "city": "  Tehran " }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let body = test::read_body(resp).await;
        assert_eq!(body, r#"{"weather":"clear sky","temp":31.2}"#.as_bytes());
    }
}
