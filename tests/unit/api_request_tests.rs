//! Unit tests for `api_call` method and argument parsing.

use serde_json::json;

use farm_autopilot::analytics::SortBy;
use farm_autopilot::models::snapshot::QuietHours;
use farm_autopilot::worker::api::IntervalKind;
use farm_autopilot::worker::ApiRequest;
use farm_autopilot::AppError;

fn parse(method: &str, args: serde_json::Value) -> ApiRequest {
    ApiRequest::parse(method, &args).unwrap()
}

fn parse_err(method: &str, args: serde_json::Value) -> String {
    match ApiRequest::parse(method, &args).unwrap_err() {
        AppError::Control(msg) => msg,
        other => panic!("expected control error, got {other:?}"),
    }
}

#[test]
fn argumentless_methods() {
    assert_eq!(parse("getLands", json!(null)), ApiRequest::GetLands);
    assert_eq!(parse("getFriends", json!([])), ApiRequest::GetFriends);
    assert_eq!(parse("getSeeds", json!(null)), ApiRequest::GetSeeds);
    assert_eq!(parse("getIntervals", json!([])), ApiRequest::GetIntervals);
    assert_eq!(
        parse("getPlantingStrategy", json!([])),
        ApiRequest::GetPlantingStrategy
    );
    assert_eq!(parse("debugSellFruits", json!([])), ApiRequest::DebugSellFruits);
    assert_eq!(parse("getTasks", json!([])), ApiRequest::GetTasks);
    assert_eq!(parse("getStats", json!([])), ApiRequest::GetStats);
    assert_eq!(parse("resetStats", json!([])), ApiRequest::ResetStats);
}

#[test]
fn positional_arguments() {
    assert_eq!(
        parse("getFriendLands", json!([1234])),
        ApiRequest::GetFriendLands { gid: 1234 }
    );
    assert_eq!(
        parse("doFriendOp", json!([1234, "steal"])),
        ApiRequest::DoFriendOp {
            gid: 1234,
            op: "steal".into()
        }
    );
    assert_eq!(
        parse("doFarmOp", json!(["harvest"])),
        ApiRequest::DoFarmOp { op: "harvest".into() }
    );
}

#[test]
fn bare_value_stands_for_first_argument() {
    assert_eq!(
        parse("doFarmOp", json!("weed")),
        ApiRequest::DoFarmOp { op: "weed".into() }
    );
    assert_eq!(
        parse("setSeed", json!({ "seedId": 20_003 })),
        ApiRequest::SetSeed { seed_id: 20_003 }
    );
}

#[test]
fn object_arguments() {
    assert_eq!(
        parse("setAutomation", json!([{ "key": "sell", "value": false }])),
        ApiRequest::SetAutomation {
            key: "sell".into(),
            value: false
        }
    );
    assert_eq!(
        parse("setIntervals", json!([{ "type": "friend", "value": 30 }])),
        ApiRequest::SetIntervals {
            kind: IntervalKind::Friend,
            value: 30
        }
    );
    assert_eq!(
        parse("setPlantingStrategy", json!([{ "strategy": "maxExp" }])),
        ApiRequest::SetPlantingStrategy {
            strategy: "maxExp".into()
        }
    );
    assert_eq!(
        parse(
            "setFriendQuietHours",
            json!([{ "enabled": true, "start": "22:00", "end": "06:00" }])
        ),
        ApiRequest::SetFriendQuietHours(QuietHours {
            enabled: true,
            start: "22:00".into(),
            end: "06:00".into(),
        })
    );
}

#[test]
fn reconnect_code_is_optional() {
    assert_eq!(
        parse("reconnect", json!([])),
        ApiRequest::Reconnect { code: None }
    );
    assert_eq!(
        parse("reconnect", json!([{ "code": "" }])),
        ApiRequest::Reconnect { code: None }
    );
    assert_eq!(
        parse("reconnect", json!([{ "code": "fresh" }])),
        ApiRequest::Reconnect {
            code: Some("fresh".into())
        }
    );
}

#[test]
fn analytics_sort_key() {
    assert_eq!(
        parse("getAnalytics", json!([])),
        ApiRequest::GetAnalytics {
            sort_by: SortBy::Exp
        }
    );
    assert_eq!(
        parse("getAnalytics", json!(["gold"])),
        ApiRequest::GetAnalytics {
            sort_by: SortBy::Gold
        }
    );
    assert!(parse_err("getAnalytics", json!(["speed"])).contains("unknown sort key"));
}

#[test]
fn unknown_method_has_fixed_text() {
    assert_eq!(parse_err("launchRocket", json!([])), "Unknown method");
}

#[test]
fn missing_and_invalid_arguments() {
    assert_eq!(
        parse_err("getFriendLands", json!([])),
        "getFriendLands: missing argument 0"
    );
    assert_eq!(
        parse_err("doFriendOp", json!([1])),
        "doFriendOp: missing argument 1"
    );
    assert!(parse_err("getFriendLands", json!(["abc"]))
        .starts_with("getFriendLands: invalid argument 0"));
    assert!(parse_err("setIntervals", json!([{ "type": "bank", "value": 3 }]))
        .starts_with("setIntervals: invalid argument 0"));
}
