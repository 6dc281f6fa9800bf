use rocket::Route;

mod admin;
mod auth;
mod businesses;
mod posts;
mod questions;
mod vehicles;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(questions::routes());
    routes.extend(businesses::routes());
    routes.extend(vehicles::routes());
    routes.extend(posts::routes());
    routes.extend(admin::routes());
    routes
}
