/*
 * Responsibility
 * - v1 の URL 構造と upstream の対応を宣言
 * - group 単位の role 要件と、route 単位の上書き (handler 優先)
 */
use axum::http::Method;

use crate::api::route_table::{RouteGroup, RouteTable};
use crate::config::Upstreams;
use crate::services::auth::{Role, RouteAuthSpec};

pub fn route_table(upstreams: &Upstreams) -> RouteTable {
    let customers = || RouteAuthSpec::roles([Role::User, Role::Admin]);
    let admins = || RouteAuthSpec::roles([Role::Admin]);

    RouteTable::new()
        .group(
            RouteGroup::new("/api/v1/auth", upstreams.users.clone())
                .public(Method::POST, "/register")
                .public(Method::POST, "/login"),
        )
        .group(
            RouteGroup::new("/api/v1/users", upstreams.users.clone())
                .protected(Method::GET, "/profile")
                .protected(Method::PUT, "/profile"),
        )
        .group(
            RouteGroup::new("/api/v1/foods", upstreams.menu.clone())
                .require(admins())
                .public(Method::GET, "")
                .public(Method::GET, "/{id}")
                .protected(Method::POST, "")
                .protected(Method::PUT, "/{id}")
                .protected(Method::DELETE, "/{id}"),
        )
        .group(
            RouteGroup::new("/api/v1/cart", upstreams.cart.clone())
                .require(customers())
                .protected(Method::GET, "")
                .protected(Method::POST, "/items")
                .protected(Method::DELETE, "/items/{id}"),
        )
        .group(
            RouteGroup::new("/api/v1/orders", upstreams.orders.clone())
                .require(customers())
                .protected(Method::GET, "")
                .protected(Method::POST, "")
                .protected_with(Method::GET, "/whoami", RouteAuthSpec::any_role())
                .protected_with(Method::GET, "/all", admins())
                .protected_with(Method::PATCH, "/{id}/status", admins()),
        )
}
