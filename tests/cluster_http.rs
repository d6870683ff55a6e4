use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use imagegate::{
    access::AccessRecord,
    backend::{AccessReview, BackendConnector, ResourceAction},
    challenge::ChallengeMapper,
    cluster::ClusterConnector,
    config::ClusterConfig,
    credential::Credential,
    engine::AccessController,
    error::{AuthError, BackendError},
};
use serde_json::json;
use std::sync::Arc;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header as header_eq, method, path},
};

const LOCAL_REVIEW_PATH: &str =
    "/apis/authorization.openshift.io/v1/namespaces/myns/localsubjectaccessreviews";
const CLUSTER_REVIEW_PATH: &str = "/apis/authorization.openshift.io/v1/subjectaccessreviews";
const USER_PATH: &str = "/apis/user.openshift.io/v1/users/~";

fn connector(host: &str) -> ClusterConnector {
    ClusterConnector::new(&ClusterConfig {
        host: host.to_string(),
        timeout_ms: 1_000,
        ..ClusterConfig::default()
    })
    .expect("connector")
}

fn layers_action(verb: &str, name: &str) -> ResourceAction {
    ResourceAction {
        verb: verb.to_string(),
        group: "image.openshift.io".to_string(),
        resource: "imagestreams/layers".to_string(),
        resource_name: Some(name.to_string()),
    }
}

fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).expect("header"),
    );
    headers
}

#[tokio::test]
async fn local_review_posts_namespaced_request_with_token() {
    let cluster = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOCAL_REVIEW_PATH))
        .and(header_eq("authorization", "Bearer sha256~token"))
        .and(body_json(json!({
            "kind": "LocalSubjectAccessReview",
            "apiVersion": "authorization.openshift.io/v1",
            "namespace": "myns",
            "verb": "update",
            "resourceAPIGroup": "image.openshift.io",
            "resource": "imagestreams/layers",
            "resourceName": "myapp",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "namespace": "myns",
            "allowed": true,
            "reason": "allowed by cluster rule",
        })))
        .expect(1)
        .mount(&cluster)
        .await;

    let backend = connector(&cluster.uri())
        .connect(&Credential::new("sha256~token"))
        .expect("backend");
    let review = backend
        .local_access_review("myns", &layers_action("update", "myapp"))
        .await
        .expect("review");
    assert!(review.allowed);
    assert_eq!(review.reason, "allowed by cluster rule");
}

#[tokio::test]
async fn cluster_review_omits_namespace_and_resource_name() {
    let cluster = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CLUSTER_REVIEW_PATH))
        .and(body_json(json!({
            "kind": "SubjectAccessReview",
            "apiVersion": "authorization.openshift.io/v1",
            "verb": "delete",
            "resourceAPIGroup": "image.openshift.io",
            "resource": "images",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"allowed": false})))
        .expect(1)
        .mount(&cluster)
        .await;

    let backend = connector(&cluster.uri())
        .connect(&Credential::new("token"))
        .expect("backend");
    let review = backend
        .cluster_access_review(&ResourceAction {
            verb: "delete".to_string(),
            group: "image.openshift.io".to_string(),
            resource: "images".to_string(),
            resource_name: None,
        })
        .await
        .expect("review");
    assert_eq!(review, AccessReview::denied(""));
}

#[tokio::test]
async fn anonymous_caller_sends_no_authorization_header() {
    let cluster = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(USER_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"metadata": {"name": "system:anonymous"}})),
        )
        .mount(&cluster)
        .await;

    let backend = connector(&cluster.uri())
        .connect(&Credential::anonymous())
        .expect("backend");
    let user = backend.current_user().await.expect("user");
    assert_eq!(user.name.as_deref(), Some("system:anonymous"));

    let requests = cluster.received_requests().await.expect("recorded requests");
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn host_with_path_prefix_is_preserved() {
    let cluster = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/proxy{USER_PATH}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"metadata": {}})))
        .expect(1)
        .mount(&cluster)
        .await;

    let backend = connector(&format!("{}/proxy/", cluster.uri()))
        .connect(&Credential::new("token"))
        .expect("backend");
    let user = backend.current_user().await.expect("user");
    assert_eq!(user.name, None);
}

#[tokio::test]
async fn rejection_statuses_map_to_rejection_errors() {
    for (status, expected) in [
        (401, BackendError::Unauthorized),
        (403, BackendError::Forbidden),
    ] {
        let cluster = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(USER_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&cluster)
            .await;

        let backend = connector(&cluster.uri())
            .connect(&Credential::new("token"))
            .expect("backend");
        let err = backend.current_user().await.expect_err("rejected");
        assert_eq!(err, expected);
        assert!(err.is_rejection());
    }
}

#[tokio::test]
async fn server_error_keeps_status_and_message() {
    let cluster = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOCAL_REVIEW_PATH))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"message": "etcdserver: timeout"})),
        )
        .mount(&cluster)
        .await;

    let backend = connector(&cluster.uri())
        .connect(&Credential::new("token"))
        .expect("backend");
    let err = backend
        .local_access_review("myns", &layers_action("get", "myapp"))
        .await
        .expect_err("server error");
    assert_eq!(
        err,
        BackendError::Status {
            status: 500,
            message: "etcdserver: timeout".to_string(),
        }
    );
    assert!(!err.is_rejection());
}

#[tokio::test]
async fn invalid_json_payload_is_reported() {
    let cluster = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOCAL_REVIEW_PATH))
        .respond_with(ResponseTemplate::new(201).set_body_string("not json"))
        .mount(&cluster)
        .await;

    let backend = connector(&cluster.uri())
        .connect(&Credential::new("token"))
        .expect("backend");
    let err = backend
        .local_access_review("myns", &layers_action("get", "myapp"))
        .await
        .expect_err("payload error");
    assert!(matches!(err, BackendError::Payload(_)), "{err:?}");
}

#[tokio::test]
async fn unreachable_cluster_is_a_transport_error() {
    let backend = connector("http://127.0.0.1:9")
        .connect(&Credential::new("token"))
        .expect("backend");
    let err = backend.current_user().await.expect_err("unreachable");
    assert!(matches!(err, BackendError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn controller_authorizes_mount_against_cluster_api() {
    let cluster = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(
            "/apis/authorization.openshift.io/v1/namespaces/other/localsubjectaccessreviews",
        ))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"allowed": false})))
        .expect(1)
        .mount(&cluster)
        .await;
    Mock::given(method("POST"))
        .and(path(LOCAL_REVIEW_PATH))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"allowed": true})))
        .expect(1)
        .mount(&cluster)
        .await;

    let controller = AccessController::new(
        ChallengeMapper::new("origin", None, None),
        Arc::new(connector(&cluster.uri())),
        "image.openshift.io",
    );

    // The pull denial on other/base names a repository nobody is pushing to.
    let failure = controller
        .authorized(
            &bearer("token"),
            &[
                AccessRecord::repository("other/base", "pull"),
                AccessRecord::repository("myns/myapp", "push"),
            ],
        )
        .await
        .expect_err("denied");
    assert_eq!(failure.error(), &AuthError::AccessDenied);
    assert_eq!(failure.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn controller_surfaces_cluster_outage_without_challenge() {
    let cluster = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(USER_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"error": "unavailable"})))
        .mount(&cluster)
        .await;

    let controller = AccessController::new(
        ChallengeMapper::new("origin", None, None),
        Arc::new(connector(&cluster.uri())),
        "image.openshift.io",
    );
    let failure = controller
        .authorized(&bearer("token"), &[])
        .await
        .expect_err("outage");
    assert!(failure.challenge().is_none());
    assert_eq!(failure.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        failure.error(),
        &AuthError::Backend(BackendError::Status {
            status: 503,
            message: "unavailable".to_string(),
        })
    );
}
