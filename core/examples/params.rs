use anyhow::Context;
use log::info;
use rebind::bind::{FieldSpec, FromRaw};
use rebind::middleware::LogMiddleware;
use rebind::request::{Bound, Query, Text};
use rebind::route::{RouteGroup, Router};
use rebind::server::Server;
use std::collections::HashMap;

#[derive(Debug, FromRaw)]
struct UserId(i64);

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // GET /greet?username=john&age=30: declared scalars, one of them
    // defaulted. /greet?username= passes the required check with an
    // empty username, /greet alone answers 400.
    fn greet(Bound(params): Bound) -> String {
        let username = params.str_field("username").unwrap_or_default();
        let age = params.int_field("age").unwrap_or_default();
        info!("username={}, age={}", username, age);
        format!("hello {}, age {}", username, age)
    }

    // GET /params?a=1&b=2: every parameter as one map, for handlers
    // that do not declare fields upfront.
    fn params_map(Query(params): Query<HashMap<String, String>>) -> String {
        info!("params={:?}", params);
        "ok".to_string()
    }

    // GET /ids?userIds=1&userIds=2: collect every value for one name,
    // in request order.
    fn ids(Bound(params): Bound) -> String {
        params.seq_field("userIds").unwrap_or_default().join(",")
    }

    // POST /echo: the raw body as one opaque text field; requires a
    // charset on the Content-Type.
    fn echo(Text(body): Text) -> String {
        info!("messageBody={}", body);
        body
    }

    fn list_users() -> &'static str {
        "get users"
    }

    fn add_user() -> &'static str {
        "post user"
    }

    fn find_user(Bound(params): Bound) -> anyhow::Result<String> {
        let id = params
            .parse::<UserId>("userId")?
            .context("userId is always bound on this route")?;
        Ok(format!("get userId={}", id.0))
    }

    fn update_user(Bound(params): Bound) -> String {
        format!(
            "update userId={}",
            params.str_field("userId").unwrap_or_default()
        )
    }

    fn delete_user(Bound(params): Bound) -> String {
        format!(
            "delete userId={}",
            params.str_field("userId").unwrap_or_default()
        )
    }

    let user_id_table = || vec![FieldSpec::string("userId").required()];

    // Resource-style group: list/add/find/update/delete under /users.
    let users = RouteGroup::new("/users")
        .get("", list_users)
        .post("", add_user)
        .get_bound("/<userId>", user_id_table(), find_user)
        .patch_bound("/<userId>", user_id_table(), update_user)
        .delete_bound("/<userId>", user_id_table(), delete_user);

    let app = Router::default()
        .get_bound(
            "/greet",
            vec![
                FieldSpec::string("username").required(),
                FieldSpec::integer("age").default_value("-1"),
            ],
            greet,
        )
        .get("/params", params_map)
        .get_bound(
            "/ids",
            vec![FieldSpec::sequence("userIds").required()],
            ids,
        )
        .post("/echo", echo)
        .groups(vec![users])
        .middleware(LogMiddleware {});

    Server::new("127.0.0.1", 8080).router(app).run()
}
