//! Integration tests for the REST engine client against a live HTTP mock

use httpmock::prelude::*;
use serde_json::json;

use web_vision::engine::types::{
    AppEnvironment, AppOutput, BatchInfo, MatchWindowData, RegionRequest, SessionStartInfo,
};
use web_vision::{ComparisonEngine, EngineError, RestConfig, RestEngine, check_health};

fn start_info() -> SessionStartInfo {
    SessionStartInfo {
        agent_id: "web-vision/0.1.0".to_string(),
        app_id_or_name: "shop".to_string(),
        scenario_id_or_name: "landing page".to_string(),
        batch_info: BatchInfo::new(Some("nightly".to_string())),
        environment: AppEnvironment::detect(None, None),
    }
}

#[test]
fn test_open_match_close_round_trip() {
    let server = MockServer::start();

    let open_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/sessions/running")
            .query_param("apiKey", "secret")
            .json_body_includes(r#"{"startInfo": {"appIdOrName": "shop"}}"#);
        then.status(200)
            .json_body(json!({"id": "s1", "url": "http://results/s1", "isNew": true}));
    });
    let match_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/sessions/running/s1")
            .json_body_includes(
                r#"{"tag": "home", "ignoreMismatch": false,
                    "region": {"top": 2, "left": 1, "width": 30, "height": 40,
                               "isRelativeToScreenshot": true}}"#,
            );
        then.status(200).json_body(json!({"asExpected": true, "windowId": "w1"}));
    });
    let close_mock = server.mock(|when, then| {
        when.method(DELETE)
            .path("/api/sessions/running/s1")
            .query_param("aborted", "false");
        then.status(200).json_body(json!({
            "isPassed": true, "steps": 1, "matches": 1, "mismatches": 0, "missing": 0,
            "url": "http://results/s1"
        }));
    });

    let engine = RestEngine::new(RestConfig::new(server.base_url()).api_key("secret"));

    let session = engine.open_session(&start_info()).unwrap();
    assert_eq!(session.id, "s1");
    assert_eq!(session.is_new, Some(true));

    let data = MatchWindowData {
        tag: Some("home".to_string()),
        ignore_mismatch: false,
        match_timeout_ms: 2000,
        region: Some(RegionRequest {
            top: 2,
            left: 1,
            width: 30,
            height: 40,
            is_relative_to_screenshot: true,
        }),
        app_output: AppOutput {
            title: "Shop".to_string(),
            screenshot_png: vec![137, 80, 78, 71],
        },
    };
    let result = engine.match_window(&session, &data).unwrap();
    assert!(result.as_expected);
    assert_eq!(result.window_id, "w1");

    let results = engine.close_session(&session, false).unwrap();
    assert!(results.is_passed);
    assert_eq!(results.url.as_deref(), Some("http://results/s1"));

    open_mock.assert();
    match_mock.assert();
    close_mock.assert();
}

#[test]
fn test_rejected_request_surfaces_status_and_body() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/sessions/running");
        then.status(401).body("bad api key");
    });

    let engine = RestEngine::new(RestConfig::new(server.base_url()));
    let err = engine.open_session(&start_info()).unwrap_err();
    match err {
        EngineError::Server { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "bad api key");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_unparseable_body_is_an_invalid_response() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/sessions/running");
        then.status(200).body("not json");
    });

    let engine = RestEngine::new(RestConfig::new(server.base_url()));
    let err = engine.open_session(&start_info()).unwrap_err();
    assert!(matches!(err, EngineError::InvalidResponse(_)));
}

#[test]
fn test_health_check_distinguishes_reachable_from_not() {
    let server = MockServer::start();
    // Any response, even 404 for an unmatched path, counts as reachable.
    assert!(check_health(&server.base_url(), 2).unwrap());

    // Nothing listens on port 9; the connection itself fails.
    assert!(!check_health("http://127.0.0.1:9", 2).unwrap());
}
