//! Wire-format tests: the event names and payload shapes are the contract
//! both sides depend on, so they are pinned here against raw JSON.

use serde_json::{self as json, Value};
use talkline::protocol::{
    resolve_room, ChatMessage, ClientEvent, Presence, ServerEvent,
};

fn parse(json_str: &str) -> Value {
    json::from_str(json_str).expect("valid json")
}

fn sample_message() -> ChatMessage {
    ChatMessage {
        sender: "a@x.com".to_owned(),
        receiver: "b@x.com".to_owned(),
        room: resolve_room("a@x.com", "b@x.com").unwrap(),
        text: "hi".to_owned(),
        timestamp: "2026-03-01T12:00:00Z".to_owned(),
    }
}

#[test]
fn user_login_envelope() {
    let event = ClientEvent::UserLogin { email: "a@x.com".to_owned() };
    let s = json::to_string(&event).expect("serialize");
    let v = parse(&s);

    assert_eq!(v["event"], "user_login");
    assert_eq!(v["data"]["email"], "a@x.com");

    let back: ClientEvent = json::from_str(&s).expect("deserialize");
    assert_eq!(back, event);
}

#[test]
fn get_online_users_is_a_bare_event() {
    let s = json::to_string(&ClientEvent::GetOnlineUsers).expect("serialize");
    assert_eq!(parse(&s)["event"], "get_online_users");

    let back: ClientEvent = json::from_str(r#"{"event":"get_online_users"}"#).expect("deserialize");
    assert_eq!(back, ClientEvent::GetOnlineUsers);
}

#[test]
fn send_message_roundtrip() {
    let event = ClientEvent::SendMessage(sample_message());
    let s = json::to_string(&event).expect("serialize");
    let v = parse(&s);

    assert_eq!(v["event"], "send_message");
    assert_eq!(v["data"]["sender"], "a@x.com");
    assert_eq!(v["data"]["receiver"], "b@x.com");
    assert_eq!(v["data"]["room"], "a@x.com|b@x.com");
    assert_eq!(v["data"]["text"], "hi");
    assert_eq!(v["data"]["timestamp"], "2026-03-01T12:00:00Z");

    let back: ClientEvent = json::from_str(&s).expect("deserialize");
    assert_eq!(back, event);
}

#[test]
fn typing_envelope_carries_both_parties_and_the_room() {
    let event = ClientEvent::Typing {
        room: resolve_room("a@x.com", "b@x.com").unwrap(),
        sender: "a@x.com".to_owned(),
        receiver: "b@x.com".to_owned(),
        status: true,
    };
    let v = parse(&json::to_string(&event).expect("serialize"));

    assert_eq!(v["event"], "typing");
    assert_eq!(v["data"]["status"], true);
    assert_eq!(v["data"]["receiver"], "b@x.com");
}

#[test]
fn status_update_uses_lowercase_presence() {
    let event = ServerEvent::StatusUpdate {
        email: "a@x.com".to_owned(),
        status: Presence::Offline,
    };
    let s = json::to_string(&event).expect("serialize");
    let v = parse(&s);

    assert_eq!(v["event"], "user_status_update");
    assert_eq!(v["data"]["status"], "offline");

    let back: ServerEvent = json::from_str(&s).expect("deserialize");
    assert_eq!(back, event);
}

#[test]
fn online_users_list_envelope() {
    let event = ServerEvent::OnlineUsers { users: vec!["a@x.com".to_owned()] };
    let v = parse(&json::to_string(&event).expect("serialize"));

    assert_eq!(v["event"], "online_users_list");
    assert_eq!(v["data"]["users"][0], "a@x.com");
}

#[test]
fn history_envelope_preserves_message_order() {
    let mut second = sample_message();
    second.text = "there".to_owned();
    let event = ServerEvent::History {
        room: resolve_room("a@x.com", "b@x.com").unwrap(),
        messages: vec![sample_message(), second],
    };
    let s = json::to_string(&event).expect("serialize");
    let v = parse(&s);

    assert_eq!(v["event"], "history_loaded");
    assert_eq!(v["data"]["room"], "a@x.com|b@x.com");
    assert_eq!(v["data"]["messages"][0]["text"], "hi");
    assert_eq!(v["data"]["messages"][1]["text"], "there");

    let back: ServerEvent = json::from_str(&s).expect("deserialize");
    assert_eq!(back, event);
}

#[test]
fn receive_message_payload_is_the_message_itself() {
    let event = ServerEvent::Message(sample_message());
    let v = parse(&json::to_string(&event).expect("serialize"));

    assert_eq!(v["event"], "receive_message");
    assert_eq!(v["data"]["text"], "hi");
    assert_eq!(v["data"]["timestamp"], "2026-03-01T12:00:00Z");
}

#[test]
fn error_envelope_roundtrip() {
    let event = ServerEvent::Error { message: "message text and room are required".to_owned() };
    let s = json::to_string(&event).expect("serialize");
    let v = parse(&s);

    assert_eq!(v["event"], "error");
    assert_eq!(v["data"]["message"], "message text and room are required");

    let back: ServerEvent = json::from_str(&s).expect("deserialize");
    assert_eq!(back, event);
}

#[test]
fn room_id_serializes_as_a_plain_string() {
    let room = resolve_room("b@x.com", "a@x.com").unwrap();
    assert_eq!(json::to_string(&room).unwrap(), r#""a@x.com|b@x.com""#);
}
