//! Closing, robustness against stray records, peer limits and renegotiation.

mod dtls_common;

use std::net::SocketAddr;
use std::sync::Arc;

use dtls_common::*;
use nanodtls::{AlertDescription, AlertLevel, Context, Error, Event, Session, State};

fn close_notify() -> Event {
    Event::Alert {
        level: AlertLevel::Warning,
        description: AlertDescription::CloseNotify,
    }
}

#[test]
fn close_notify_is_answered() {
    let mut pair = Pair::psk();
    pair.handshake();
    take_events(&mut pair.client);
    take_events(&mut pair.server);

    pair.client.close(server_session(), pair.now).unwrap();
    assert_eq!(pair.client.peer_state(server_session()), Some(State::Closing));
    assert!(matches!(
        pair.client.write(server_session(), b"late"),
        Err(Error::NotConnected)
    ));

    pair.pump();
    assert_eq!(take_events(&mut pair.server), vec![close_notify(), Event::Closed]);
    assert_eq!(take_events(&mut pair.client), vec![close_notify(), Event::Closed]);
    assert_eq!(pair.client.peer_count(), 0);
    assert_eq!(pair.server.peer_count(), 0);
    assert_eq!(pair.client.poll_timeout(), None);
}

#[test]
fn server_can_close_too() {
    let mut pair = Pair::psk();
    pair.handshake();
    take_events(&mut pair.client);

    pair.server.close(client_session(), pair.now).unwrap();
    pair.pump();
    assert_eq!(take_events(&mut pair.client), vec![close_notify(), Event::Closed]);
    assert_eq!(pair.client.peer_count(), 0);
    assert_eq!(pair.server.peer_count(), 0);
}

#[test]
fn unanswered_close_expires() {
    let mut pair = Pair::psk();
    pair.handshake();
    take_events(&mut pair.client);

    pair.client.close(server_session(), pair.now).unwrap();
    take_outbox(&mut pair.client);
    assert!(pair.client.poll_timeout().is_some());

    assert!(pair.advance_client());
    // close_notify is never retransmitted.
    assert!(take_outbox(&mut pair.client).is_empty());
    assert_eq!(take_events(&mut pair.client), vec![Event::Closed]);
    assert_eq!(pair.client.peer_count(), 0);
}

#[test]
fn close_during_handshake_forgets_peer() {
    let mut pair = Pair::psk();
    pair.connect();
    take_outbox(&mut pair.client);

    pair.client.close(server_session(), pair.now).unwrap();
    assert!(take_outbox(&mut pair.client).is_empty());
    assert_eq!(take_events(&mut pair.client), vec![Event::Closed]);
    assert_eq!(pair.client.peer_count(), 0);
    assert_eq!(pair.client.poll_timeout(), None);
}

#[test]
fn stray_records_from_unknown_peer_are_dropped() {
    let mut pair = Pair::psk();

    pair.server
        .handle_message(client_session(), &[0xff; 40], pair.now)
        .unwrap();

    // Epoch 1 application data.
    let record = [
        23, 0xfe, 0xfd, 0, 1, 0, 0, 0, 0, 0, 1, 0, 4, 1, 2, 3, 4,
    ];
    pair.server
        .handle_message(client_session(), &record, pair.now)
        .unwrap();

    // A truncated handshake record.
    let record = [22, 0xfe, 0xfd, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 1, 0, 0];
    pair.server
        .handle_message(client_session(), &record, pair.now)
        .unwrap();

    assert!(take_outbox(&mut pair.server).is_empty());
    assert!(take_events(&mut pair.server).is_empty());
    assert_eq!(pair.server.peer_count(), 0);
}

#[test]
fn cookie_is_bound_to_the_client_address() {
    let mut pair = Pair::psk();
    pair.connect();
    pair.to_server();
    pair.to_client();

    let hello = take_outbox(&mut pair.client);
    let elsewhere = Session::new("10.0.0.1:40001".parse::<SocketAddr>().unwrap(), 1);
    for d in &hello {
        pair.server.handle_message(elsewhere, d, pair.now).unwrap();
    }

    assert_eq!(
        plaintext_handshake_types(&take_outbox(&mut pair.server)),
        vec![HELLO_VERIFY_REQUEST]
    );
    assert_eq!(pair.server.peer_count(), 0);
}

#[test]
fn invalid_client_hellos_allocate_nothing() {
    let mut pair = Pair::psk();
    pair.connect();

    let cookieless = take_outbox(&mut pair.client).remove(0);
    pair.client.handler_mut().outbox.push(cookieless.clone());
    pair.to_server();
    pair.to_client();

    let with_cookie = take_outbox(&mut pair.client).remove(0);
    let mut forged = with_cookie.clone();
    // Record header, handshake header, version and random come first.
    let sid_len = forged[59] as usize;
    assert!(forged[60 + sid_len] > 0);
    forged[61 + sid_len] ^= 0x01;

    for _ in 0..5 {
        for hello in [&cookieless, &forged] {
            pair.server
                .handle_message(client_session(), hello, pair.now)
                .unwrap();
            let answer = take_outbox(&mut pair.server);
            assert_eq!(answer.len(), 1);
            assert_eq!(plaintext_handshake_types(&answer), vec![HELLO_VERIFY_REQUEST]);
            assert_eq!(pair.server.peer_count(), 0);
        }
    }
    assert_eq!(pair.server.poll_timeout(), None);

    pair.server
        .handle_message(client_session(), &with_cookie, pair.now)
        .unwrap();
    assert_eq!(pair.server.peer_count(), 1);
}

#[test]
fn restarted_client_replaces_association() {
    let mut pair = Pair::psk();
    pair.handshake();
    take_events(&mut pair.server);

    // Same address, no memory of the old session.
    let config = Arc::new(config(5).build().unwrap());
    pair.client = Context::new(config, TestHandler::psk_client(), pair.now).unwrap();
    pair.connect();
    pair.to_server();
    pair.to_client();
    assert!(take_events(&mut pair.server).is_empty());

    pair.to_server();
    assert_eq!(take_events(&mut pair.server), vec![Event::Closed]);
    assert_eq!(pair.server.peer_count(), 1);

    pair.pump();
    pair.assert_connected();
    assert_eq!(take_events(&mut pair.server), vec![Event::Connected]);
}

#[test]
fn write_requires_a_connected_peer() {
    let mut pair = Pair::psk();
    assert!(matches!(
        pair.client.write(server_session(), b"x"),
        Err(Error::UnknownPeer)
    ));

    pair.connect();
    assert!(matches!(
        pair.client.write(server_session(), b"x"),
        Err(Error::NotConnected)
    ));
    assert!(matches!(
        pair.client.connect(server_session(), pair.now),
        Err(Error::PeerExists)
    ));
}

#[test]
fn peer_table_limit() {
    let mut pair = Pair::new(
        TestHandler::psk_client(),
        config(1).max_peers(1),
        TestHandler::psk_server(),
        config(2).max_peers(1),
    );
    pair.handshake();

    let other = Session::new("10.0.0.3:5684".parse::<SocketAddr>().unwrap(), 1);
    assert!(matches!(
        pair.client.connect(other, pair.now),
        Err(Error::PeerTableFull)
    ));

    // A second client gets through the cookie exchange but no further.
    let config = Arc::new(config(3).build().unwrap());
    let mut second = Context::new(config, TestHandler::psk_client(), pair.now).unwrap();
    let second_addr = Session::new("10.0.0.4:40000".parse::<SocketAddr>().unwrap(), 1);

    second.connect(server_session(), pair.now).unwrap();
    for d in take_outbox(&mut second) {
        pair.server.handle_message(second_addr, &d, pair.now).unwrap();
    }
    for d in take_outbox(&mut pair.server) {
        second.handle_message(server_session(), &d, pair.now).unwrap();
    }

    let mut refused = false;
    for d in take_outbox(&mut second) {
        refused |= matches!(
            pair.server.handle_message(second_addr, &d, pair.now),
            Err(Error::PeerTableFull)
        );
    }
    assert!(refused);
    assert_eq!(pair.server.peer_count(), 1);
    assert_eq!(pair.server.peer_state(client_session()), Some(State::Connected));
}

#[test]
fn replayed_and_forged_records_are_dropped() {
    let mut pair = Pair::psk();
    pair.handshake();

    pair.client.write(server_session(), b"once").unwrap();
    let sent = take_outbox(&mut pair.client);
    for _ in 0..2 {
        pair.server
            .handle_message(client_session(), &sent[0], pair.now)
            .unwrap();
    }
    assert_eq!(pair.server.handler().received, vec![b"once".to_vec()]);

    pair.client.write(server_session(), b"forged").unwrap();
    let mut forged = take_outbox(&mut pair.client).remove(0);
    let last = forged.len() - 1;
    forged[last] ^= 0x01;
    pair.server
        .handle_message(client_session(), &forged, pair.now)
        .unwrap();

    // Same record moved back to epoch 0.
    pair.client.write(server_session(), b"plain").unwrap();
    let mut downgraded = take_outbox(&mut pair.client).remove(0);
    downgraded[3] = 0;
    downgraded[4] = 0;
    pair.server
        .handle_message(client_session(), &downgraded, pair.now)
        .unwrap();

    assert_eq!(pair.server.handler().received, vec![b"once".to_vec()]);
    assert!(take_outbox(&mut pair.server).is_empty());
    pair.assert_connected();
}

#[test]
fn renegotiation_moves_to_the_next_epoch() {
    let mut pair = Pair::psk();
    pair.handshake();
    take_events(&mut pair.client);
    take_events(&mut pair.server);

    pair.client.renegotiate(server_session(), pair.now).unwrap();
    assert_eq!(pair.client.peer_state(server_session()), Some(State::ClientHello));

    // The association stays usable while the handshake runs.
    pair.client.write(server_session(), b"during").unwrap();

    pair.pump();
    pair.assert_connected();
    assert_eq!(take_events(&mut pair.client), vec![Event::Connected]);
    assert_eq!(take_events(&mut pair.server), vec![Event::Connected]);
    assert_eq!(pair.server.handler().received, vec![b"during".to_vec()]);

    pair.client.write(server_session(), b"after").unwrap();
    let sent = take_outbox(&mut pair.client);
    assert_eq!(collect_headers(&sent)[0].epoch, 2);
    pair.client.handler_mut().outbox = sent;
    pair.to_server();
    assert_eq!(
        pair.server.handler().received,
        vec![b"during".to_vec(), b"after".to_vec()]
    );
}

#[test]
fn refused_renegotiation_keeps_session() {
    let mut pair = Pair::new(
        TestHandler::psk_client(),
        config(1),
        TestHandler::psk_server(),
        config(2).renegotiation(false),
    );
    pair.handshake();
    take_events(&mut pair.client);

    pair.client.renegotiate(server_session(), pair.now).unwrap();
    pair.pump();

    assert_eq!(
        take_events(&mut pair.client),
        vec![Event::Alert {
            level: AlertLevel::Warning,
            description: AlertDescription::NoRenegotiation,
        }]
    );
    pair.assert_connected();
    assert_eq!(pair.client.poll_timeout(), None);

    pair.client.write(server_session(), b"still here").unwrap();
    pair.to_server();
    assert_eq!(pair.server.handler().received, vec![b"still here".to_vec()]);
}

#[test]
fn only_connected_clients_renegotiate() {
    let mut pair = Pair::psk();
    assert!(matches!(
        pair.client.renegotiate(server_session(), pair.now),
        Err(Error::UnknownPeer)
    ));

    pair.handshake();
    assert!(matches!(
        pair.server.renegotiate(client_session(), pair.now),
        Err(Error::NotConnected)
    ));
}
