//! Small declarative helpers shared by the HTTP apps.

/// Generate a `routes` function that registers actix handlers on a
/// `ServiceConfig`.
///
/// ```ignore
/// macros_utils::routes! {
///     route health_route,
/// }
///
/// macros_utils::routes! {
///     scope "/api" =>
///     route list_urls,
///     route add_url,
/// }
/// ```
#[cfg(feature = "actix")]
#[macro_export]
macro_rules! routes {
    (scope $prefix:literal => $(route $handler:ident),* $(,)?) => {
        pub fn routes(cfg: &mut ::actix_web::web::ServiceConfig) {
            cfg.service(::actix_web::web::scope($prefix)$(.service($handler))*);
        }
    };
    ($(route $handler:ident),* $(,)?) => {
        pub fn routes(cfg: &mut ::actix_web::web::ServiceConfig) {
            $(cfg.service($handler);)*
        }
    };
}
