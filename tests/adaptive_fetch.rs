mod common;

use common::*;
use eo_adapter::{
    AdapterError, Coordinates, FetchClient, Location, TimeSpec, build_meteomatics_url,
};
use serde_json::json;

fn build(codes: &[String]) -> eo_adapter::Result<String> {
    build_meteomatics_url(
        "https://api.test",
        &TimeSpec::Raw("2025-07-01T00:00:00Z".into()),
        codes,
        &Coordinates::Point(Location::new(47.0, 8.0).unwrap()),
    )
}

#[test]
fn success_attaches_url_and_empty_dropped_list() {
    let t = ScriptedTransport::queue(vec![ok(r#"{"status":"OK"}"#)]);
    let client = FetchClient::new(&t, Some(creds()), fast_config(2));
    let out = client.fetch(codes(&["t_2m:C"]), build).unwrap();

    assert_eq!(out.body, json!({"status":"OK"}));
    assert_eq!(
        out.meta.request_url,
        "https://api.test/2025-07-01T00:00:00Z/t_2m:C/47,8/json"
    );
    assert!(out.meta.dropped_parameters.is_empty());
    assert_eq!(out.meta.attempts, 1);
    assert_eq!(*t.saw_auth.borrow(), vec![true]);
}

#[test]
fn server_errors_are_retried_then_succeed() {
    let t = ScriptedTransport::queue(vec![
        status(503, "busy"),
        network("connection reset"),
        ok("{}"),
    ]);
    let client = FetchClient::new(&t, None, fast_config(2));
    let out = client.fetch(codes(&["a"]), build).unwrap();
    assert_eq!(out.meta.attempts, 3);
    assert_eq!(t.urls().len(), 3);
    assert!(t.urls().iter().all(|u| u == &t.urls()[0]));
}

#[test]
fn server_errors_surface_after_retry_budget() {
    let t = ScriptedTransport::queue(vec![
        status(500, "boom"),
        status(502, "boom"),
        status(504, "boom"),
        ok("{}"),
    ]);
    let client = FetchClient::new(&t, None, fast_config(2));
    let err = client.fetch(codes(&["a"]), build).unwrap_err();
    match err {
        AdapterError::TransientUpstream {
            attempts, status, ..
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(status, Some(504));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(t.urls().len(), 3);
}

#[test]
fn network_failures_surface_after_retry_budget() {
    let t = ScriptedTransport::queue(vec![network("dns"), network("dns")]);
    let client = FetchClient::new(&t, None, fast_config(1));
    let err = client.fetch(codes(&["a"]), build).unwrap_err();
    assert!(matches!(
        err,
        AdapterError::TransientUpstream { status: None, attempts: 2, .. }
    ));
}

#[test]
fn plain_client_errors_fail_without_retry() {
    let t = ScriptedTransport::queue(vec![status(401, "Unauthorized access"), ok("{}")]);
    let client = FetchClient::new(&t, Some(creds()), fast_config(3));
    let err = client.fetch(codes(&["t_2m:C"]), build).unwrap_err();
    match &err {
        AdapterError::Upstream {
            status,
            status_text,
            body,
            ..
        } => {
            assert_eq!(*status, 401);
            assert_eq!(status_text, "Unauthorized");
            assert_eq!(body, "Unauthorized access");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(t.urls().len(), 1);
    assert_eq!(err.to_body().error, "upstream_error");
}

#[test]
fn incorrect_url_strips_unit_suffixes_exactly_once() {
    let t = ScriptedTransport::queue(vec![status(400, "Incorrect URL"), ok("{}")]);
    let client = FetchClient::new(&t, Some(creds()), fast_config(2));
    let out = client
        .fetch(codes(&["t_2m:C", "wind_speed_10m:ms"]), build)
        .unwrap();

    let urls = t.urls();
    assert_eq!(urls.len(), 2);
    assert_eq!(param_segment(&urls[0]), "t_2m:C,wind_speed_10m:ms");
    assert_eq!(param_segment(&urls[1]), "t_2m,wind_speed_10m");
    assert_eq!(out.meta.parameters, codes(&["t_2m", "wind_speed_10m"]));
    assert!(out.meta.dropped_parameters.is_empty());
}

#[test]
fn codes_merged_by_stripping_are_reported_as_dropped() {
    let t = ScriptedTransport::queue(vec![status(400, "Incorrect URL"), ok("{}")]);
    let client = FetchClient::new(&t, Some(creds()), fast_config(2));
    let requested = codes(&["t_2m:C", "t_2m:F", "precip_1h:mm"]);
    let out = client.fetch(requested.clone(), build).unwrap();

    assert_eq!(out.meta.parameters, codes(&["t_2m", "precip_1h"]));
    assert_eq!(out.meta.dropped_parameters, codes(&["t_2m:F"]));
    assert_eq!(
        out.meta.parameters.len() + out.meta.dropped_parameters.len(),
        requested.len()
    );
}

#[test]
fn second_rejection_after_strip_fails() {
    let t = ScriptedTransport::queue(vec![
        status(400, "Incorrect URL"),
        status(400, "Incorrect URL"),
        ok("{}"),
    ]);
    let client = FetchClient::new(&t, Some(creds()), fast_config(2));
    let err = client.fetch(codes(&["t_2m:C"]), build).unwrap_err();
    assert!(matches!(err, AdapterError::Upstream { status: 400, .. }));
    assert_eq!(t.urls().len(), 2);
}

#[test]
fn rejection_without_suffixes_fails_immediately() {
    let t = ScriptedTransport::queue(vec![status(400, "Bad Request"), ok("{}")]);
    let client = FetchClient::new(&t, None, fast_config(2));
    let err = client.fetch(codes(&["T2M", "RH2M"]), build).unwrap_err();
    assert!(matches!(err, AdapterError::Upstream { status: 400, .. }));
    assert_eq!(t.urls().len(), 1);
}

#[test]
fn unavailable_parameter_is_dropped_and_never_resent() {
    let t = ScriptedTransport::responder(|url| {
        if param_segment(url).split(',').any(|p| p == "b") {
            status(404, r#"{"status":"error","message":"Parameter b not available"}"#)
        } else {
            ok(r#"{"data":[]}"#)
        }
    });
    let client = FetchClient::new(&t, Some(creds()), fast_config(2));
    let out = client.fetch(codes(&["a", "b", "c"]), build).unwrap();

    assert_eq!(out.meta.parameters, codes(&["a", "c"]));
    assert_eq!(out.meta.dropped_parameters, codes(&["b"]));
    let urls = t.urls();
    assert_eq!(urls.len(), 2);
    assert_eq!(param_segment(&urls[1]), "a,c");
}

#[test]
fn dropping_every_parameter_is_an_explicit_error() {
    let t = ScriptedTransport::responder(|url| {
        let first = param_segment(url).split(',').next().unwrap_or_default().to_string();
        status(400, &format!("Parameter {} not available", first))
    });
    let client = FetchClient::new(&t, Some(creds()), fast_config(2));
    let err = client.fetch(codes(&["x", "y", "z"]), build).unwrap_err();

    match &err {
        AdapterError::AllParametersUnavailable { dropped } => {
            assert_eq!(dropped, &codes(&["x", "y", "z"]));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.dropped_parameters(), codes(&["x", "y", "z"]).as_slice());
    // One request per parameter: the loop is bounded by the parameter count.
    assert_eq!(t.urls().len(), 3);
}

#[test]
fn unknown_unavailable_parameter_stops_the_loop() {
    let t = ScriptedTransport::responder(|_| status(400, "Parameter q not available"));
    let client = FetchClient::new(&t, None, fast_config(2));
    let err = client.fetch(codes(&["a", "b"]), build).unwrap_err();
    assert!(matches!(err, AdapterError::ParameterRejected { .. }));
    assert_eq!(t.urls().len(), 1);
}

#[test]
fn strip_then_drop_stays_bounded() {
    // Every shape gets rejected: first as a malformed URL, then parameter by parameter.
    let t = ScriptedTransport::responder(|url| {
        let params = param_segment(url);
        if params.contains(':') {
            return status(400, "Incorrect URL");
        }
        let first = params.split(',').next().unwrap_or_default().to_string();
        status(400, &format!("Parameter {} not available", first))
    });
    let client = FetchClient::new(&t, None, fast_config(2));
    let err = client
        .fetch(codes(&["t_2m:C", "precip_1h:mm", "msl_pressure:hPa"]), build)
        .unwrap_err();

    assert!(matches!(err, AdapterError::AllParametersUnavailable { .. }));
    assert_eq!(
        err.dropped_parameters(),
        codes(&["t_2m", "precip_1h", "msl_pressure"]).as_slice()
    );
    // N drops plus one strip.
    assert_eq!(t.urls().len(), 4);
}

#[test]
fn non_json_success_body_is_wrapped() {
    let t = ScriptedTransport::queue(vec![ok("validdate;t_2m:C\n2025-07-01T00:00:00Z;17.9")]);
    let client = FetchClient::new(&t, None, fast_config(0));
    let out = client.fetch(codes(&["t_2m:C"]), build).unwrap();
    assert_eq!(
        out.body,
        json!({"raw": "validdate;t_2m:C\n2025-07-01T00:00:00Z;17.9"})
    );
}

#[test]
fn empty_parameter_list_fails_before_any_call() {
    let t = ScriptedTransport::queue(vec![ok("{}")]);
    let client = FetchClient::new(&t, None, fast_config(0));
    let err = client.fetch(Vec::new(), build).unwrap_err();
    assert!(matches!(err, AdapterError::MissingArgument("parameters")));
    assert!(t.urls().is_empty());
}
