//! Offer intake from line streams and files

mod common;

use common::{relay, FakeTransport};
use relay_protocol::{decode_description, encode_description, SdpKind, SessionDescription};
use relay_server::signaling::{self, OfferSource};
use std::time::Duration;

fn offer_payload(sdp: &str) -> String {
    encode_description(&SessionDescription::offer(sdp)).unwrap()
}

#[tokio::test]
async fn each_line_is_answered_and_bad_lines_are_skipped() {
    let transport = FakeTransport::new();
    let relay = relay(&transport);
    let input = format!(
        "{}\n\nnot-a-payload\n  {}  \n",
        offer_payload("one"),
        offer_payload("two")
    );
    let mut out = Vec::new();

    let answered = signaling::answer_lines(&relay, input.as_bytes(), &mut out)
        .await
        .unwrap();

    assert_eq!(answered, 2);
    assert_eq!(relay.registry().len(), 2);

    let answers: Vec<_> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|line| decode_description(line).unwrap())
        .collect();
    assert_eq!(answers.len(), 2);
    assert!(answers.iter().all(|a| a.kind == SdpKind::Answer));
    assert_eq!(answers[0].sdp, "answer to one");
    assert_eq!(answers[1].sdp, "answer to two");
}

#[tokio::test]
async fn offer_files_are_answered_in_order() {
    let transport = FakeTransport::new();
    let relay = relay(&transport);
    let dir = std::env::temp_dir().join(format!("relay-offers-{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.unwrap();

    let first = dir.join("1.sdp");
    let second = dir.join("2.sdp");
    let missing = dir.join("missing.sdp");
    // Wrapped payloads decode the same as single-line ones
    let wrapped = offer_payload("first");
    let (head, tail) = wrapped.split_at(8);
    tokio::fs::write(&first, format!("{head}\n{tail}\n")).await.unwrap();
    tokio::fs::write(&second, offer_payload("second")).await.unwrap();

    let source = OfferSource::Files {
        paths: vec![first, missing, second],
        interval: Duration::ZERO,
    };
    let mut out = Vec::new();
    let answered = signaling::run(&relay, &source, &mut out).await.unwrap();
    tokio::fs::remove_dir_all(&dir).await.ok();

    assert_eq!(answered, 2);
    let sdps: Vec<_> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|line| decode_description(line).unwrap().sdp)
        .collect();
    assert_eq!(sdps, vec!["answer to first", "answer to second"]);
}
