use actix_web::web::ServiceConfig;

mod check;
mod health;
mod monitoring;
mod urls;


pub fn routes(cfg: &mut ServiceConfig) {
    cfg.configure(health::routes)
        .configure(check::routes)
        .configure(urls::routes)
        .configure(monitoring::routes);
}
