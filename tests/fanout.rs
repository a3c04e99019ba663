//! Chat session scenarios: join/welcome round-trip, message fanout with
//! sender exclusion, leave notices, and the client stub's automatic
//! rebinding across leader changes.

mod common;

use common::*;

use ringchat::{
    udp_bind_reusable, ChatClientStub, ClientConfig, ClientEvent, Datagram,
};

use tokio::net::UdpSocket;
use tokio::time::{timeout, Duration};

// E4 + E5: two clients join, exchange a message, one leaves. The leader
// must enrich messages with the sender name, exclude the sender from the
// fanout, and drop messages from departed clients.
#[tokio::test(flavor = "multi_thread")]
async fn join_message_leave_fanout() {
    let (disc_port, serv_port) = (43040, 43041);
    let mut config = fast_config(disc_port);
    config.boot_delay_ms = 100;
    let (_id, shutdown, _handle) = spawn_node(serv_port, config).await;

    // client X joins once the node has crowned itself
    let x = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let name_x =
        join_until_welcomed(&x, "x", serv_port, Duration::from_secs(3))
            .await
            .expect("client X was never welcomed");
    assert_eq!(name_x, "Client 1");
    drain(&x).await; // start from a quiet socket before Y's join notice

    // client Y joins; X gets the join notice
    let y = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let join_y = Datagram::Join {
        id: "y".into(),
        port: y.local_addr().unwrap().port(),
    };
    send_dgram(&y, &join_y, ("127.0.0.1", serv_port)).await;
    let welcome_y = recv_matching(&y, Duration::from_secs(1), |d| {
        matches!(d, Datagram::Welcome { .. })
    })
    .await
    .expect("client Y was never welcomed");
    assert_eq!(
        welcome_y,
        Datagram::Welcome {
            name: "Client 2".into()
        }
    );
    let notice = recv_matching(&x, Duration::from_secs(1), |d| {
        matches!(d, Datagram::Notice { .. })
    })
    .await
    .expect("client X missed the join notice");
    assert_eq!(
        notice,
        Datagram::Notice {
            text: "Client 2 ist beigetreten.".into()
        }
    );

    // X speaks; Y receives the name-enriched message, X gets no echo
    let msg = Datagram::Message {
        id: "x".into(),
        text: "hi".into(),
        sender_name: None,
    };
    send_dgram(&x, &msg, ("127.0.0.1", serv_port)).await;
    let relayed = recv_matching(&y, Duration::from_secs(1), |d| {
        matches!(d, Datagram::Message { .. })
    })
    .await
    .expect("client Y missed the message");
    assert_eq!(
        relayed,
        Datagram::Message {
            id: "x".into(),
            text: "hi".into(),
            sender_name: Some("Client 1".into()),
        }
    );
    assert!(
        recv_matching(&x, Duration::from_millis(300), |d| {
            matches!(d, Datagram::Message { .. })
        })
        .await
        .is_none(),
        "sender must be excluded from its own fanout"
    );

    // X leaves; Y gets the leave notice
    send_dgram(
        &x,
        &Datagram::Leave { id: "x".into() },
        ("127.0.0.1", serv_port),
    )
    .await;
    let notice = recv_matching(&y, Duration::from_secs(1), |d| {
        matches!(d, Datagram::Notice { .. })
    })
    .await
    .expect("client Y missed the leave notice");
    assert_eq!(
        notice,
        Datagram::Notice {
            text: "Client 1 hat den Chat verlassen.".into()
        }
    );

    // a message from the departed X must be dropped, not relayed
    send_dgram(&x, &msg, ("127.0.0.1", serv_port)).await;
    assert!(
        recv_matching(&y, Duration::from_millis(300), |d| {
            matches!(d, Datagram::Message { .. })
        })
        .await
        .is_none(),
        "messages from unknown senders must be dropped"
    );

    shutdown.send(true).unwrap();
}

// The client stub locates the leader from its heartbeat, joins on its own,
// and re-sends the join when a different leader starts beating.
#[tokio::test(flavor = "multi_thread")]
async fn client_stub_joins_and_rejoins_on_leader_change() {
    let (disc_port, serv_port) = (43060, 43061);
    let mut config = fast_config(disc_port);
    config.boot_delay_ms = 100;
    let (node_id, shutdown, _handle) = spawn_node(serv_port, config).await;

    let client_config = ClientConfig {
        discovery_port: disc_port,
        chan_cap: 64,
    };
    let mut stub = ChatClientStub::new_and_setup(client_config).await.unwrap();
    let stub_id = stub.id().clone();

    // the stub must find the leader and get welcomed without further help
    let mut found_leader = false;
    let mut welcome_name = None;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !(found_leader && welcome_name.is_some()) {
        let remaining =
            deadline.saturating_duration_since(tokio::time::Instant::now());
        let event = timeout(remaining, stub.next_event())
            .await
            .expect("stub saw no welcome in time")
            .expect("stub event channel closed");
        match event {
            ClientEvent::LeaderFound { id, .. } => {
                assert_eq!(id, node_id);
                found_leader = true;
            }
            ClientEvent::Welcome { name } => welcome_name = Some(name),
            _ => {}
        }
    }
    assert!(found_leader);
    assert_eq!(welcome_name.unwrap(), "Client 1");

    // a new leader appears: heartbeats under a different id pointing at
    // our fake service socket; the stub must re-send its join there
    let fake_service = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let fake_port = fake_service.local_addr().unwrap().port();
    let beacon = udp_bind_reusable(0, true).unwrap();
    let beat = Datagram::Heartbeat {
        id: "zzz".into(),
        port: fake_port,
    };
    for _ in 0..5 {
        send_dgram(&beacon, &beat, (LO_BCAST, disc_port)).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let rejoin = recv_matching(&fake_service, Duration::from_secs(2), |d| {
        matches!(d, Datagram::Join { .. })
    })
    .await
    .expect("stub did not re-join the new leader");
    match rejoin {
        Datagram::Join { id, .. } => assert_eq!(id, stub_id),
        _ => unreachable!(),
    }

    shutdown.send(true).unwrap();
}
