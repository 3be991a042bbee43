//! Flight retransmission and handshake timeouts.

mod dtls_common;

use std::time::Duration;

use dtls_common::*;
use nanodtls::{Event, State};

#[test]
fn lost_client_hello_is_resent() {
    let mut pair = Pair::psk();
    pair.connect();

    let first = take_outbox(&mut pair.client);
    let deadline = pair.client.poll_timeout().expect("flight timer");
    assert!(deadline > pair.now);

    // Nothing happens before the deadline.
    pair.client
        .handle_timeout(deadline - Duration::from_millis(1))
        .unwrap();
    assert!(take_outbox(&mut pair.client).is_empty());

    assert!(pair.advance_client());
    let again = take_outbox(&mut pair.client);
    assert_eq!(plaintext_handshake_types(&again), vec![CLIENT_HELLO]);
    assert!(collect_headers(&again)[0].seq > collect_headers(&first)[0].seq);

    // The rest of the handshake runs over the resent hello.
    pair.client.handler_mut().outbox = again;
    pair.pump();
    pair.assert_connected();
}

#[test]
fn backoff_doubles_between_attempts() {
    let mut pair = Pair::new(
        TestHandler::psk_client(),
        config(1).flight_retries(3),
        TestHandler::psk_server(),
        config(2),
    );
    pair.connect();
    take_outbox(&mut pair.client);

    let mut delays = Vec::new();
    let mut last = pair.now;
    for _ in 0..3 {
        let at = pair.client.poll_timeout().unwrap();
        delays.push(at - last);
        last = at;
        assert!(pair.advance_client());
        take_outbox(&mut pair.client);
    }

    // 500ms start with at most 25% jitter either way.
    assert!(delays[0] >= Duration::from_millis(375) && delays[0] <= Duration::from_millis(625));
    assert!(delays[1] >= Duration::from_millis(750) && delays[1] <= Duration::from_millis(1250));
    assert!(delays[2] >= Duration::from_millis(1500) && delays[2] <= Duration::from_millis(2500));
}

#[test]
fn handshake_times_out_after_retries() {
    let mut pair = Pair::new(
        TestHandler::psk_client(),
        config(1).flight_retries(2),
        TestHandler::psk_server(),
        config(2),
    );
    pair.connect();
    take_outbox(&mut pair.client);

    assert!(pair.advance_client());
    assert_eq!(take_outbox(&mut pair.client).len(), 1);
    assert!(pair.advance_client());
    assert_eq!(take_outbox(&mut pair.client).len(), 1);

    // Out of retries: give up instead of sending.
    assert!(pair.advance_client());
    assert!(take_outbox(&mut pair.client).is_empty());
    assert_eq!(take_events(&mut pair.client), vec![Event::Timeout]);
    assert_eq!(pair.client.poll_timeout(), None);
    assert_eq!(pair.client.peer_count(), 0);
}

#[test]
fn lost_server_flight_is_resent_on_duplicate_hello() {
    let mut pair = Pair::psk();
    pair.connect();
    pair.to_server();
    pair.to_client();
    pair.to_server();

    // The server's first flight is lost.
    let lost = take_outbox(&mut pair.server);
    assert_eq!(
        plaintext_handshake_types(&lost),
        vec![SERVER_HELLO, SERVER_HELLO_DONE]
    );
    assert_eq!(pair.client.peer_state(server_session()), Some(State::ClientHello));

    // The client's resent ClientHello prompts the server to resend its flight.
    assert!(pair.advance_client());
    pair.to_server();
    let resent = take_outbox(&mut pair.server);
    assert_eq!(plaintext_handshake_types(&resent), vec![SERVER_HELLO, SERVER_HELLO_DONE]);
    assert_eq!(pair.server.peer_count(), 1);

    pair.server.handler_mut().outbox = resent;
    pair.pump();
    pair.assert_connected();
}

#[test]
fn lost_final_flight_is_resent_on_duplicate_finished() {
    let mut pair = Pair::psk();
    pair.connect();
    pair.to_server();
    pair.to_client();
    pair.to_server();
    pair.to_client();
    // Client key exchange, change cipher spec and finished.
    pair.to_server();
    assert_eq!(pair.server.peer_state(client_session()), Some(State::Connected));

    // The server's last flight is lost.
    take_outbox(&mut pair.server);
    assert_ne!(pair.client.peer_state(server_session()), Some(State::Connected));

    // The client times out and resends its last flight, the server answers with its own.
    assert!(pair.advance_client());
    pair.to_server();
    pair.to_client();
    pair.assert_connected();
}

#[test]
fn connected_peers_have_no_timers() {
    let mut pair = Pair::psk();
    pair.handshake();
    assert_eq!(pair.client.poll_timeout(), None);
    assert_eq!(pair.server.poll_timeout(), None);

    pair.client.write(server_session(), b"data").unwrap();
    pair.to_server();
    assert_eq!(pair.client.poll_timeout(), None);
}
