pub mod auth;
pub mod ingredients;
pub mod recipes;
pub mod tags;
pub mod users;

use actix_web::web;

pub fn create_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/auth/token").configure(auth::create_routes))
        .service(web::scope("/ingredients").configure(ingredients::create_routes))
        .service(web::scope("/recipes").configure(recipes::create_routes))
        .service(web::scope("/tags").configure(tags::create_routes))
        .service(web::scope("/users").configure(users::create_routes));
}
