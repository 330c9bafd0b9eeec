mod support;

use std::sync::Arc;

use parceltrace_core::{
    CanonicalStatus, CarrierCode, CarrierCredential, CredentialEnvironment, EtaEstimate,
    FailureCategory, HttpError, ResolveFailure, ResultStatus, SourceProvider,
    StaticCredentialStore, TraceTime, TrackingQuery,
};
use serde_json::json;
use support::{
    builder, kuaidi100_events, sf_routes, tracker, tracker_with_fallback, ScriptedHttpClient,
    KUAIDI100_HOST, SF_HOST, ZTO_HOST,
};

const SF_NUMBER: &str = "SF1234567890123";
const ZTO_NUMBER: &str = "731234567890";

fn query(number: &str) -> TrackingQuery {
    TrackingQuery::new(number).expect("valid tracking number")
}

#[tokio::test]
async fn incomplete_sf_credential_fails_before_any_request() {
    let client = Arc::new(ScriptedHttpClient::new());
    let store = StaticCredentialStore::new([CarrierCredential::new(
        CarrierCode::Sf,
        CredentialEnvironment::Sandbox,
    )
    .with_key("partner_id", "P001")]);
    let tracker = builder(client.clone())
        .with_credential_store(Arc::new(store))
        .build()
        .expect("tracker builds");

    let result = tracker.resolve(query(SF_NUMBER)).await;

    assert!(!result.success);
    assert!(result.traces.is_empty());
    assert_eq!(result.canonical_status, CanonicalStatus::Unknown);
    match result.failure {
        Some(ResolveFailure::CredentialIncomplete { carrier, ref missing }) => {
            assert_eq!(carrier, CarrierCode::Sf);
            assert_eq!(missing, &vec![String::from("check_word")]);
        }
        other => panic!("expected incomplete credential, got {other:?}"),
    }
    assert!(result.status_text.contains("check_word"));
    assert!(client.requests().is_empty());
}

#[tokio::test]
async fn sf_delivered_route_reports_delivery_time() {
    let body = sf_routes(
        SF_NUMBER,
        json!([
            {"acceptTime": "2024-05-01 09:12:00", "acceptAddress": "深圳市", "remark": "顺丰速运 已收取快件", "opCode": "50"},
            {"acceptTime": "2024-05-02 15:20:00", "acceptAddress": "杭州市", "remark": "快件已签收，签收人：本人", "opCode": "80"}
        ]),
    );
    let client = Arc::new(ScriptedHttpClient::new().route_json(SF_HOST, body));
    let tracker = tracker(client.clone());

    let result = tracker.resolve(query(SF_NUMBER)).await;

    assert!(result.success);
    assert_eq!(result.carrier_code, Some(CarrierCode::Sf));
    assert_eq!(result.canonical_status, CanonicalStatus::Delivered);
    assert_eq!(result.status, ResultStatus::Tracked(CanonicalStatus::Delivered));
    assert_eq!(result.source_provider, SourceProvider::Primary);
    assert_eq!(result.traces.len(), 2);
    assert_eq!(result.traces[0].location.as_deref(), Some("杭州市"));

    let delivered_at = TraceTime::parse("2024-05-02 15:20:00").expect("valid time");
    assert_eq!(
        result.estimated_delivery,
        Some(EtaEstimate::AlreadyDelivered { at: delivered_at })
    );
    assert_eq!(client.requests_to(SF_HOST), 1);
}

#[tokio::test]
async fn sf_timeout_falls_back_to_aggregator() {
    let client = Arc::new(
        ScriptedHttpClient::new()
            .route_error(SF_HOST, HttpError::timeout("request timeout"))
            .route_json(
                KUAIDI100_HOST,
                kuaidi100_events(json!([
                    {"time": "2024-05-03 07:40:00", "context": "快件已到达【杭州西湖营业部】", "areaName": "杭州市"},
                    {"time": "2024-05-02 21:10:00", "context": "快件已发往杭州转运中心"},
                    {"time": "2024-05-02 09:00:00", "context": "顺丰速运 已收取快件"}
                ])),
            ),
    );
    let tracker = tracker_with_fallback(client.clone());

    let result = tracker.resolve(query(SF_NUMBER)).await;

    assert!(result.success);
    assert!(result.failure.is_none());
    assert_eq!(result.source_provider, SourceProvider::Secondary);
    assert_eq!(result.traces.len(), 3);
    assert!(result.status_text.ends_with(" (fallback: kuaidi100)"));
    assert!(result.traces[0].description.contains("营业部"));
    assert_eq!(client.requests_to(SF_HOST), 1);
    assert_eq!(client.requests_to(KUAIDI100_HOST), 1);

    let fallback_body = client.requests()[1].body.clone().unwrap_or_default();
    assert!(fallback_body.contains("shunfeng"));
}

#[tokio::test]
async fn zto_phone_check_requests_verification_digits() {
    let client = Arc::new(ScriptedHttpClient::new().route_json(
        ZTO_HOST,
        r#"{"status":false,"statusCode":"S212","message":"请输入收件人手机号后四位"}"#,
    ));
    let tracker = tracker_with_fallback(client.clone());

    let result = tracker.resolve(query(ZTO_NUMBER)).await;

    assert!(!result.success);
    assert!(result.needs_verification());
    assert!(result.traces.is_empty());
    assert_eq!(client.requests_to(KUAIDI100_HOST), 0);

    let value = serde_json::to_value(&result).expect("serializable");
    assert_eq!(value["status"], "need_phone_verify");
    assert_eq!(value["traces"], json!([]));
}

#[tokio::test]
async fn rejected_zto_digits_are_not_a_new_verification_request() {
    let client = Arc::new(ScriptedHttpClient::new().route_json(
        ZTO_HOST,
        r#"{"status":false,"statusCode":"S212","message":"手机号后四位不匹配"}"#,
    ));
    let tracker = tracker(client.clone());

    let query = query(ZTO_NUMBER)
        .with_verification_digits("4321")
        .expect("valid digits");
    let result = tracker.resolve(query).await;

    assert!(!result.needs_verification());
    assert_eq!(
        result.failure.as_ref().map(ResolveFailure::category),
        Some(FailureCategory::ProviderBusiness)
    );
    let body = client.requests()[0].body.clone().unwrap_or_default();
    assert!(body.contains("4321"));
}

#[tokio::test]
async fn missing_credentials_never_reach_the_network() {
    let client = Arc::new(ScriptedHttpClient::new());
    let tracker = builder(client.clone())
        .with_credential_store(Arc::new(StaticCredentialStore::default()))
        .build()
        .expect("tracker builds");

    for number in [
        SF_NUMBER,
        "JDVA12345678901",
        "YT1234567890123",
        "7712345678901",
        ZTO_NUMBER,
    ] {
        let result = tracker.resolve(query(number)).await;
        assert!(
            matches!(result.failure, Some(ResolveFailure::CredentialMissing { .. })),
            "{number}: {:?}",
            result.failure
        );
        assert_eq!(
            result.failure.as_ref().map(ResolveFailure::category),
            Some(FailureCategory::Configuration)
        );
    }
    assert!(client.requests().is_empty());
}

#[tokio::test]
async fn primary_success_never_consults_the_aggregator() {
    let body = sf_routes(
        SF_NUMBER,
        json!([{"acceptTime": "2024-05-02 20:00:00", "remark": "快件已发往杭州", "opCode": "30"}]),
    );
    let client = Arc::new(
        ScriptedHttpClient::new()
            .route_json(SF_HOST, body)
            .route_json(KUAIDI100_HOST, kuaidi100_events(json!([]))),
    );
    let tracker = tracker_with_fallback(client.clone());

    let result = tracker.resolve(query(SF_NUMBER)).await;

    assert!(result.success);
    assert_eq!(result.source_provider, SourceProvider::Primary);
    assert!(!result.status_text.contains("fallback"));
    assert_eq!(client.requests_to(KUAIDI100_HOST), 0);
}

#[tokio::test]
async fn silent_primary_and_aggregator_mean_no_data_yet() {
    let client = Arc::new(
        ScriptedHttpClient::new()
            .route_json(ZTO_HOST, r#"{"status":true,"result":[]}"#)
            .route_json(
                KUAIDI100_HOST,
                r#"{"result":false,"returnCode":"500","message":"查询无结果，请隔段时间再查"}"#,
            ),
    );
    let tracker = tracker_with_fallback(client.clone());

    let result = tracker.resolve(query(ZTO_NUMBER)).await;

    assert!(matches!(
        result.failure,
        Some(ResolveFailure::NoDataYet {
            carrier: CarrierCode::Zto
        })
    ));
    assert_eq!(result.source_provider, SourceProvider::Secondary);
    assert_eq!(client.requests_to(KUAIDI100_HOST), 1);
}

#[tokio::test]
async fn primary_error_survives_a_failed_fallback() {
    let client = Arc::new(
        ScriptedHttpClient::new()
            .route_json(
                ZTO_HOST,
                r#"{"status":false,"statusCode":"S202","message":"sign error"}"#,
            )
            .route_status(KUAIDI100_HOST, 502),
    );
    let tracker = tracker_with_fallback(client);

    let result = tracker.resolve(query(ZTO_NUMBER)).await;

    match result.failure {
        Some(ResolveFailure::ProviderBusiness { ref code, .. }) => {
            assert_eq!(code.as_deref(), Some("S202"));
        }
        other => panic!("expected provider business failure, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_format_without_carrier_is_unresolved() {
    let client = Arc::new(ScriptedHttpClient::new());
    let tracker = tracker(client.clone());

    let result = tracker.resolve(query("1Z999AA10123456784")).await;

    assert_eq!(
        result.failure.as_ref().map(ResolveFailure::category),
        Some(FailureCategory::CarrierUnresolved)
    );
    assert_eq!(result.carrier_code, None);
    assert!(client.requests().is_empty());
}
