//! Tool dispatch against a mocked action service.

use deskpilot_adapters::ActionTools;
use deskpilot_agent::ToolAdapter;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn run(tools: &ActionTools, name: &str, args: Value) -> Value {
    let out = tools.execute(name, args).await.unwrap();
    serde_json::from_str(&out).unwrap()
}

#[tokio::test]
async fn plain_text_is_typed_with_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/os/keyboard/type"))
        .and(query_param("text", "hello"))
        .and(query_param("token", "s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let tools = ActionTools::new(server.uri()).with_token("s3cret");
    let result = run(&tools, "type_text", json!({"text": "hello"})).await;
    assert_eq!(result["ok"], true);
    assert_eq!(result["status"], "ok");
}

#[tokio::test]
async fn accented_text_goes_through_the_clipboard() {
    let server = MockServer::start().await;
    Mock::given(path("/os/clipboard/set"))
        .and(query_param("text", "é"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "len": 1})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/os/keyboard/paste"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "action": "paste"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/os/keyboard/type"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tools = ActionTools::new(server.uri());
    let result = run(&tools, "type_text", json!({"text": "é"})).await;
    assert_eq!(result["ok"], true);
    assert_eq!(result["clipboard"]["len"], 1);
    assert_eq!(result["paste"]["action"], "paste");

    let paths: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_owned())
        .collect();
    assert_eq!(paths, ["/os/clipboard/set", "/os/keyboard/paste"]);
}

#[tokio::test]
async fn failed_clipboard_skips_the_paste() {
    let server = MockServer::start().await;
    Mock::given(path("/os/clipboard/set"))
        .respond_with(ResponseTemplate::new(423).set_body_json(json!({"ok": false, "error": "DeskPilot is disabled (panic mode)"})))
        .mount(&server)
        .await;
    Mock::given(path("/os/keyboard/paste"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tools = ActionTools::new(server.uri());
    let result = run(&tools, "paste_text", json!({"text": "a\nb"})).await;
    assert_eq!(result["ok"], false);
    assert_eq!(result["clipboard"]["status"], 423);
}

#[tokio::test]
async fn missing_text_sends_nothing() {
    let server = MockServer::start().await;
    let tools = ActionTools::new(server.uri());

    let result = run(&tools, "type_text", json!({"text": "  "})).await;
    assert_eq!(result, json!({"ok": false, "status": 400, "error": "missing_text_argument"}));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn run_app_resolves_aliases_and_reports_both_names() {
    let server = MockServer::start().await;
    Mock::given(path("/app/run"))
        .and(query_param("name", "notepad"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"ok": false, "error": "notepad not in allowlist"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tools = ActionTools::new(server.uri());
    let result = run(&tools, "run_app", json!({"name": "  Bloc-Notes "})).await;
    assert_eq!(result["ok"], false);
    assert_eq!(result["status"], 403);
    assert_eq!(result["tried_name"], "  Bloc-Notes ");
    assert_eq!(result["normalized_key"], "notepad");
}

#[tokio::test]
async fn non_json_body_is_wrapped() {
    let server = MockServer::start().await;
    Mock::given(path("/screen/screenshot"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let tools = ActionTools::new(server.uri());
    let result = run(&tools, "screenshot", json!({})).await;
    assert_eq!(result["ok"], false);
    assert_eq!(result["status"], 500);
    assert_eq!(result["error"]["raw"], "Internal Server Error");
}

#[tokio::test]
async fn sleep_needs_no_server() {
    let tools = ActionTools::new("http://127.0.0.1:9");
    let result = run(&tools, "sleep", json!({"sec": -3})).await;
    assert_eq!(result, json!({"ok": true, "slept": 0.0}));
}

#[tokio::test]
async fn unknown_tool_is_an_error() {
    let tools = ActionTools::new("http://127.0.0.1:9");
    let err = tools.execute("format_disk", json!({})).await.unwrap_err();
    assert_eq!(err.to_string(), "unknown tool format_disk");
}
