use runtastic_strava::{FailurePolicy, Orchestrator, Policy, RunOutcome, SyncError, SyncOptions};
use runtastic_strava_client::runtastic::{ReqwestRuntasticClient, RuntasticCredentials};
use runtastic_strava_client::strava::ReqwestStravaClient;
use secrecy::SecretString;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// 2024-05-01T10:00:00Z, 11:00 and 12:00 in epoch milliseconds.
const TEN: i64 = 1_714_557_600_000;
const ELEVEN: i64 = 1_714_561_200_000;
const NOON: i64 = 1_714_564_800_000;

async fn runtastic_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webapps/services/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"userId": "9", "accessToken": "rt"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/webapps/services/runsessions/v3/sync"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sessions": [
                {"id": "s10", "startTime": TEN},
                {"id": "s11", "startTime": ELEVEN},
                {"id": "s12", "startTime": NOON}
            ],
            "moreItemsAvailable": false,
            "syncedUntil": NOON.to_string()
        })))
        .mount(&server)
        .await;
    for (id, start) in [("s10", TEN), ("s11", ELEVEN), ("s12", NOON)] {
        Mock::given(method("GET"))
            .and(path(format!("/webapps/services/runsessions/v2/{id}/details")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": id,
                "sportType": "Running",
                "notes": format!("session {id}"),
                "trackPoints": [
                    {"time": start, "latitude": 48.2, "longitude": 16.37, "altitude": 171.0},
                    {"time": start + 5_000, "latitude": 48.2001, "longitude": 16.3702, "heartRate": 131}
                ]
            })))
            .mount(&server)
            .await;
    }
    server
}

async fn strava_server(existing: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/athlete/activities"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(existing)
                .insert_header("X-RateLimit-Limit", "600,30000")
                .insert_header("X-RateLimit-Usage", "3,40"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/athlete/activities"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;
    server
}

async fn login(server: &MockServer) -> ReqwestRuntasticClient {
    ReqwestRuntasticClient::login(
        &server.uri(),
        &RuntasticCredentials {
            email: "me@example.com".into(),
            password: SecretString::new("pw".into()),
        },
    )
    .await
    .expect("login")
}

fn strava(server: &MockServer) -> ReqwestStravaClient {
    ReqwestStravaClient::new(&server.uri(), SecretString::new("st".into()))
}

fn accepted() -> ResponseTemplate {
    ResponseTemplate::new(201).set_body_json(serde_json::json!({
        "id": 555,
        "status": "Your activity is still being processed.",
        "error": null,
        "activity_id": null
    }))
}

async fn uploaded_files(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == "/api/v3/uploads")
        .map(|r| {
            let body = String::from_utf8_lossy(&r.body).into_owned();
            ["s10", "s11", "s12"]
                .into_iter()
                .find(|id| body.contains(&format!("runtastic_activity_{id}.gpx")))
                .unwrap_or("?")
                .to_string()
        })
        .collect()
}

#[tokio::test]
async fn thorough_run_fills_gap_and_skips_existing() {
    let runtastic = runtastic_server().await;
    let dest = strava_server(serde_json::json!([
        {"id": 1, "start_date": "2024-05-01T11:00:00Z"}
    ]))
    .await;
    Mock::given(method("POST"))
        .and(path("/api/v3/uploads"))
        .and(body_string_contains("<gpx "))
        .and(body_string_contains("run"))
        .respond_with(accepted())
        .expect(2)
        .mount(&dest)
        .await;

    let source = login(&runtastic).await;
    let destination = strava(&dest);
    let options = SyncOptions {
        policy: Policy::Exhaustive,
        ..SyncOptions::default()
    };
    let outcome = Orchestrator::new(&source, &destination, options).run().await;

    assert!(matches!(outcome, RunOutcome::Completed { uploaded: 2, .. }), "{outcome:?}");
    assert_eq!(uploaded_files(&dest).await, vec!["s10", "s12"]);
}

#[tokio::test]
async fn normal_run_uploads_only_newer_activities() {
    let runtastic = runtastic_server().await;
    let dest = strava_server(serde_json::json!([
        {"id": 1, "start_date": "2024-05-01T11:00:00Z"}
    ]))
    .await;
    Mock::given(method("POST"))
        .and(path("/api/v3/uploads"))
        .and(body_string_contains("runtastic-s12"))
        .respond_with(accepted())
        .expect(1)
        .mount(&dest)
        .await;

    let source = login(&runtastic).await;
    let destination = strava(&dest);
    let outcome = Orchestrator::new(&source, &destination, SyncOptions::default())
        .run()
        .await;

    assert_eq!(outcome.uploaded(), 1);
    assert_eq!(uploaded_files(&dest).await, vec!["s12"]);
}

#[tokio::test]
async fn rejected_upload_is_skipped_or_aborts() {
    for (failure_policy, expect_uploads) in [(FailurePolicy::Skip, 3), (FailurePolicy::Abort, 2)] {
        let runtastic = runtastic_server().await;
        let dest = strava_server(serde_json::json!([])).await;
        Mock::given(method("POST"))
            .and(path("/api/v3/uploads"))
            .and(body_string_contains("runtastic-s11"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": 556,
                "status": "There was an error processing your activity.",
                "error": "duplicate of activity 1",
                "activity_id": null
            })))
            .mount(&dest)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v3/uploads"))
            .respond_with(accepted())
            .mount(&dest)
            .await;

        let source = login(&runtastic).await;
        let destination = strava(&dest);
        let options = SyncOptions {
            failure_policy,
            ..SyncOptions::default()
        };
        let outcome = Orchestrator::new(&source, &destination, options).run().await;

        assert_eq!(uploaded_files(&dest).await.len(), expect_uploads, "{failure_policy:?}");
        match (failure_policy, outcome) {
            (FailurePolicy::Skip, RunOutcome::Completed { uploaded, skipped }) => {
                assert_eq!(uploaded, 2);
                assert_eq!(skipped.len(), 1);
                assert_eq!(skipped[0].activity_id, "s11");
            }
            (FailurePolicy::Abort, RunOutcome::Aborted { uploaded, error }) => {
                assert_eq!(uploaded, 1);
                assert!(matches!(error, SyncError::Validation(_)));
            }
            (_, other) => panic!("unexpected outcome {other:?}"),
        }
    }
}

#[tokio::test]
async fn revoked_strava_token_aborts_before_uploading() {
    let runtastic = runtastic_server().await;
    let dest = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/athlete/activities"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Authorization Error"))
        .mount(&dest)
        .await;

    let source = login(&runtastic).await;
    let destination = strava(&dest);
    let outcome = Orchestrator::new(&source, &destination, SyncOptions::default())
        .run()
        .await;

    assert!(matches!(
        outcome,
        RunOutcome::Aborted {
            uploaded: 0,
            error: SyncError::Auth(_)
        }
    ));
    assert!(uploaded_files(&dest).await.is_empty());
}
