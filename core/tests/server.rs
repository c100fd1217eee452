use hyper::{Body, Method, Request, StatusCode};
use rebind::bind::FieldSpec;
use rebind::middleware::Middleware;
use rebind::request::{Bound, ContentType, Host, Json, Query, Text};
use rebind::response::{Responder, Response};
use rebind::route::{RouteGroup, Router};
use serde::{Deserialize, Serialize};
use tools::TestCaseBuilder;


#[derive(Serialize, Deserialize)]
struct OwnBody {
    val: String,
    val2: i32,
    val3: bool,
}

impl Responder for OwnBody {
    fn into_response(self) -> anyhow::Result<Response> {
        Ok(hyper::Response::builder()
            .status(StatusCode::OK)
            .body(Body::from(serde_json::to_string(&self)?))?)
    }
}

fn greet_table() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("username").required(),
        FieldSpec::integer("age").default_value("-1"),
    ]
}

fn greet(Bound(params): Bound) -> String {
    format!(
        "username={}, age={}",
        params.str_field("username").unwrap_or_default(),
        params.int_field("age").unwrap_or_default()
    )
}

#[test]
fn test_with_client() -> anyhow::Result<()> {
    fn empty() {}

    fn str() -> &'static str {
        "hello"
    }

    fn string() -> String {
        String::from("hello")
    }

    fn result() -> anyhow::Result<&'static str> {
        Ok("ok")
    }

    fn body_handler_json(Json(body): Json<OwnBody>) -> anyhow::Result<OwnBody> {
        Ok(body)
    }

    fn content_type_handler(ContentType(content_type): ContentType) -> String {
        content_type
    }

    fn host_handler(Host(host): Host) -> String {
        host
    }

    TestCaseBuilder::new("/", Method::GET, Router::default().get("/", empty))
        .name("empty")
        .run()?;

    TestCaseBuilder::new("/str", Method::GET, Router::default().get("/str", str))
        .name("str")
        .result("hello")
        .run()?;

    TestCaseBuilder::new(
        "/string",
        Method::GET,
        Router::default().get("/string", string),
    )
    .name("string")
    .result("hello")
    .run()?;

    TestCaseBuilder::new(
        "/result",
        Method::GET,
        Router::default().get("/result", result),
    )
    .name("result")
    .result("ok")
    .run()?;

    TestCaseBuilder::new(
        "/content-type",
        Method::GET,
        Router::default().get("/content-type", content_type_handler),
    )
    .name("content-type")
    .header(hyper::header::CONTENT_TYPE, "application/json")
    .result("application/json")
    .run()?;

    TestCaseBuilder::new(
        "/host",
        Method::GET,
        Router::default().get("/host", host_handler),
    )
    .name("host")
    .header(hyper::header::HOST, "localhost")
    .result("localhost")
    .run()?;

    TestCaseBuilder::new(
        "/body",
        Method::POST,
        Router::default().post("/body", body_handler_json),
    )
    .name("body")
    .body(Body::from(
        r#"{"val":"string value","val2": 123,"val3":true}"#,
    ))
    .result(r#"{"val":"string value","val2":123,"val3":true}"#)
    .run()?;

    Ok(())
}

#[test]
fn raw_request_is_available_to_handlers() -> anyhow::Result<()> {
    fn handler(req: Request<Body>) -> String {
        req.uri().query().unwrap_or_default().to_string()
    }

    TestCaseBuilder::new(
        "/raw?username=john",
        Method::GET,
        Router::default().get("/raw", handler),
    )
    .name("raw request")
    .result("username=john")
    .run()
}

#[test]
fn bound_scalars_from_the_query() -> anyhow::Result<()> {
    TestCaseBuilder::new(
        "/greet?username=john&age=30",
        Method::GET,
        Router::default().get_bound("/greet", greet_table(), greet),
    )
    .name("bound scalars")
    .status(StatusCode::OK)
    .result("username=john, age=30")
    .run()
}

#[test]
fn missing_required_parameter_answers_bad_request() -> anyhow::Result<()> {
    TestCaseBuilder::new(
        "/greet?age=30",
        Method::GET,
        Router::default().get_bound("/greet", greet_table(), greet),
    )
    .name("missing required parameter")
    .status(StatusCode::BAD_REQUEST)
    .result("missing required parameter `username`")
    .run()
}

#[test]
fn absent_parameter_takes_the_default() -> anyhow::Result<()> {
    TestCaseBuilder::new(
        "/greet?username=john",
        Method::GET,
        Router::default().get_bound("/greet", greet_table(), greet),
    )
    .name("default applies")
    .status(StatusCode::OK)
    .result("username=john, age=-1")
    .run()
}

#[test]
fn present_empty_parameter_passes_the_required_check() -> anyhow::Result<()> {
    TestCaseBuilder::new(
        "/greet?username=&age=30",
        Method::GET,
        Router::default().get_bound("/greet", greet_table(), greet),
    )
    .name("empty string is a value")
    .status(StatusCode::OK)
    .result("username=, age=30")
    .run()
}

#[test]
fn failed_coercion_answers_bad_request() -> anyhow::Result<()> {
    TestCaseBuilder::new(
        "/greet?username=john&age=abc",
        Method::GET,
        Router::default().get_bound("/greet", greet_table(), greet),
    )
    .name("coercion failure")
    .status(StatusCode::BAD_REQUEST)
    .result("could not coerce value `abc` of parameter `age` into integer")
    .run()
}

#[test]
fn multi_valued_parameter_collects_in_order() -> anyhow::Result<()> {
    fn user_ids(Bound(params): Bound) -> String {
        params.seq_field("userIds").unwrap_or_default().join(",")
    }

    TestCaseBuilder::new(
        "/ids?userIds=1&userIds=2",
        Method::GET,
        Router::default().get_bound(
            "/ids",
            vec![FieldSpec::sequence("userIds").required()],
            user_ids,
        ),
    )
    .name("multi-valued parameter")
    .status(StatusCode::OK)
    .result("1,2")
    .run()
}

#[test]
fn path_values_flow_through_the_binder() -> anyhow::Result<()> {
    fn find_user(Bound(params): Bound) -> String {
        format!("get userId={}", params.str_field("userId").unwrap_or_default())
    }

    TestCaseBuilder::new(
        "/users/test-user",
        Method::GET,
        Router::default().get_bound(
            "/users/<userId>",
            vec![FieldSpec::string("userId").required()],
            find_user,
        ),
    )
    .name("path value")
    .status(StatusCode::OK)
    .result("get userId=test-user")
    .run()
}

#[test]
fn form_fields_bind_like_query_parameters() -> anyhow::Result<()> {
    TestCaseBuilder::new(
        "/greet",
        Method::POST,
        Router::default().post_bound("/greet", greet_table(), greet),
    )
    .name("form body")
    .header(
        hyper::header::CONTENT_TYPE,
        "application/x-www-form-urlencoded",
    )
    .body(Body::from("username=john&age=30"))
    .status(StatusCode::OK)
    .result("username=john, age=30")
    .run()
}

#[test]
fn handler_query() -> anyhow::Result<()> {
    #[derive(Serialize, Deserialize)]
    struct QueryParams {
        val: String,
        name: String,
        age: i32,
    }

    fn handler(Query(params): Query<QueryParams>) -> String {
        serde_json::to_string(&params).unwrap()
    }

    let body = r#"{"val":"value","name":"john","age":123}"#;
    TestCaseBuilder::new(
        "/query?val=value&name=john&age=123",
        Method::POST,
        Router::default().post("/query", handler),
    )
    .name("whole query as one struct")
    .result(body)
    .run()?;

    Ok(())
}

#[test]
fn raw_body_round_trips() -> anyhow::Result<()> {
    fn echo(Text(body): Text) -> String {
        body
    }

    let text = "도움이 필요하면 연락주세요, größer señor!";
    TestCaseBuilder::new(
        "/echo",
        Method::POST,
        Router::default().post("/echo", echo),
    )
    .name("raw body round trip")
    .header(hyper::header::CONTENT_TYPE, "text/plain; charset=utf-8")
    .body(Body::from(text))
    .status(StatusCode::OK)
    .result(text)
    .run()
}

#[test]
fn raw_body_without_charset_answers_bad_request() -> anyhow::Result<()> {
    fn echo(Text(body): Text) -> String {
        body
    }

    TestCaseBuilder::new(
        "/echo",
        Method::POST,
        Router::default().post("/echo", echo),
    )
    .name("raw body without charset")
    .body(Body::from("hello"))
    .status(StatusCode::BAD_REQUEST)
    .result("request body has no declared character encoding")
    .run()
}

#[test]
fn test_with_client_2_param_handlers() -> anyhow::Result<()> {
    fn handler(Bound(params): Bound, Json(mut body): Json<OwnBody>) -> OwnBody {
        body.val = params.str_field("user").unwrap_or_default().to_string();
        body
    }

    let body = r#"{"val":"string value","val2":123,"val3":true}"#;
    let changed_body = r#"{"val":"username","val2":123,"val3":true}"#;

    TestCaseBuilder::new(
        "/body/username",
        Method::POST,
        Router::default().post_bound(
            "/body/<user>",
            vec![FieldSpec::string("user").required()],
            handler,
        ),
    )
    .name("handler with bound path value and body")
    .body(Body::from(body))
    .result(changed_body)
    .run()?;

    Ok(())
}

#[test]
fn test_with_client_3_param_handlers() -> anyhow::Result<()> {
    fn handler(
        ContentType(content_type): ContentType,
        Bound(params): Bound,
        Json(mut body): Json<OwnBody>,
    ) -> OwnBody {
        body.val = format!(
            "{}:{}",
            content_type,
            params.str_field("user").unwrap_or_default()
        );
        body
    }

    let body = r#"{"val":"string value","val2":123,"val3":true}"#;
    let changed_body = r#"{"val":"application/json:john","val2":123,"val3":true}"#;

    TestCaseBuilder::new(
        "/body/john",
        Method::POST,
        Router::default().post_bound(
            "/body/<user>",
            vec![FieldSpec::string("user").required()],
            handler,
        ),
    )
    .name("handler with header, bound path value and body")
    .header(hyper::header::CONTENT_TYPE, "application/json")
    .body(Body::from(body))
    .result(changed_body)
    .run()?;

    Ok(())
}

#[test]
fn test_route_group() -> anyhow::Result<()> {
    let v1 = RouteGroup::new("/v1")
        .get("/user", || "v1")
        .get("/user2", || "v3");
    let v2 = RouteGroup::new("/v2")
        .get("/user", || "v2")
        .get("/user2", || "v4");

    let app = Router::default().groups(vec![v1, v2]);

    TestCaseBuilder::new("/v1/user", Method::GET, app.clone())
        .name("test_route_group")
        .result("v1")
        .run()?;
    TestCaseBuilder::new("/v1/user2", Method::GET, app.clone())
        .name("test_route_group")
        .result("v3")
        .run()?;

    TestCaseBuilder::new("/v2/user", Method::GET, app.clone())
        .name("test_route_group")
        .result("v2")
        .run()?;
    TestCaseBuilder::new("/v2/user2", Method::GET, app)
        .name("test_route_group")
        .result("v4")
        .run()?;
    Ok(())
}

#[test]
fn group_middlewares_are_injected_into_routes() {
    #[derive(Clone, Copy)]
    struct Noop;

    impl Middleware for Noop {}

    let group = RouteGroup::new("/v1").get("/user", || "v1").middleware(Noop);

    let routes = group.routes();
    assert!(!routes.is_empty());
    for routes in routes.values() {
        for route in routes {
            assert_eq!(route.middlewares.len(), 1);
        }
    }
}

#[test]
fn resource_style_group_with_bound_routes() -> anyhow::Result<()> {
    fn list_users() -> &'static str {
        "get users"
    }

    fn find_user(Bound(params): Bound) -> String {
        format!("get userId={}", params.str_field("userId").unwrap_or_default())
    }

    fn delete_user(Bound(params): Bound) -> String {
        format!(
            "delete userId={}",
            params.str_field("userId").unwrap_or_default()
        )
    }

    let user_id_table = || vec![FieldSpec::string("userId").required()];
    let users = RouteGroup::new("/users")
        .get("", list_users)
        .get_bound("/<userId>", user_id_table(), find_user)
        .delete_bound("/<userId>", user_id_table(), delete_user);

    let app = Router::default().groups(vec![users]);

    TestCaseBuilder::new("/users", Method::GET, app.clone())
        .name("list users")
        .result("get users")
        .run()?;
    TestCaseBuilder::new("/users/42", Method::GET, app.clone())
        .name("find user")
        .result("get userId=42")
        .run()?;
    TestCaseBuilder::new("/users/42", Method::DELETE, app)
        .name("delete user")
        .result("delete userId=42")
        .run()?;
    Ok(())
}
