pub mod accounts;
pub mod health;
pub mod tasks;
pub mod weather;

use actix_web::web;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health)
        .service(accounts::registration)
        .service(accounts::activation_confirm)
        .service(accounts::activation_resend)
        .service(accounts::token_login)
        .service(accounts::token_logout)
        .service(accounts::jwt_create)
        .service(accounts::jwt_refresh)
        .service(accounts::jwt_verify)
        .service(accounts::change_password)
        .service(accounts::reset_request)
        .service(accounts::reset_confirm)
        .service(accounts::profile_detail)
        .service(accounts::profile_update)
        .service(
            web::scope("/task")
                .service(tasks::list_tasks)
                .service(tasks::create_task)
                .service(tasks::get_task)
                .service(tasks::update_task)
                .service(tasks::patch_task)
                .service(tasks::delete_task),
        )
        .service(weather::weather_lookup);
}
