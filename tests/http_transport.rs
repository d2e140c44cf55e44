//! Two agents exchanging messages over loopback HTTP.

use courier::agent::{handler, Agent};
use courier::conductor::{Conductor, SendOutcome};
use courier::config::AgentConfig;
use courier::core::{PeerMetadata, THEIR_ENDPOINT};
use courier::messages::{Message, ReturnRoute};
use courier::transport::http::MESSAGE_PATH;
use courier::transport::{HttpInbound, HttpOutbound};
use courier::wallet::LocalWallet;
use courier::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_test::assert_ok;

const PING: &str = "did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/trust_ping/1.0/ping";
const PONG: &str = "did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/trust_ping/1.0/ping_response";
const TIMEOUT: Duration = Duration::from_secs(10);

struct Node {
    agent: Agent,
    wallet: Arc<LocalWallet>,
    did: String,
    verkey: String,
    endpoint: String,
}

impl Node {
    async fn new(name: &str) -> Self {
        let wallet = Arc::new(LocalWallet::new(name));
        let (did, verkey) = wallet.create_and_store_my_did(None);
        let inbound = HttpInbound::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}{}", inbound.local_addr().unwrap(), MESSAGE_PATH);
        let conductor = Conductor::new(
            wallet.clone(),
            Arc::new(inbound),
            Arc::new(HttpOutbound::new().unwrap()),
        );
        let config = AgentConfig::default()
            .with_wallet(name)
            .with_inbound_transport("http")
            .with_outbound_transport("http")
            .with_endpoint(&endpoint);
        Self {
            agent: Agent::new(config, Arc::new(conductor)),
            wallet,
            did,
            verkey,
            endpoint,
        }
    }

    fn knows_reachable(&self, other: &Node) {
        self.wallet.store_their_did(&other.did, &other.verkey).unwrap();
        let mut meta = PeerMetadata::new();
        meta.insert(THEIR_ENDPOINT.into(), serde_json::json!(other.endpoint));
        self.wallet.set_did_metadata(&other.did, meta);
    }

    fn knows(&self, other: &Node) {
        self.wallet.store_their_did(&other.did, &other.verkey).unwrap();
    }
}

#[tokio::test]
async fn test_ping_answered_in_http_response() {
    let alice = Node::new("alice").await;
    let bob = Node::new("bob").await;
    alice.knows_reachable(&bob);
    // No endpoint for alice: the pong can only travel in the HTTP response
    bob.knows(&alice);

    bob.agent.route(
        PING,
        handler(|agent, msg| async move {
            match agent.reply(&msg, Message::with_type(PONG)?).await? {
                SendOutcome::Delivered => Ok(()),
                SendOutcome::Queued { .. } => Err(Error::Internal("pong was queued".into())),
            }
        }),
    );
    let (tx, mut pongs) = mpsc::unbounded_channel();
    alice.agent.route(
        PONG,
        handler(move |_, msg| {
            let tx = tx.clone();
            async move {
                tx.send(msg)
                    .map_err(|_| Error::Internal("test receiver dropped".into()))
            }
        }),
    );

    let alice_run = tokio::spawn({
        let agent = alice.agent.clone();
        async move { agent.start().await }
    });
    let bob_run = tokio::spawn({
        let agent = bob.agent.clone();
        async move { agent.start().await }
    });

    let mut ping = Message::with_type(PING).unwrap();
    ping.set_return_route(ReturnRoute::All);
    // The listener is bound already, so the request waits in its backlog
    let outcome = alice
        .agent
        .send(ping, &bob.verkey, Some(&bob.did), Some(&alice.verkey), None)
        .await
        .unwrap();
    assert_eq!(outcome, SendOutcome::Delivered);

    let pong = tokio::time::timeout(TIMEOUT, pongs.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pong.type_uri(), PONG);
    let context = pong.context().unwrap();
    assert_eq!(context.from_key.as_deref(), Some(bob.verkey.as_str()));
    assert_eq!(context.to_key.as_deref(), Some(alice.verkey.as_str()));

    tokio::time::timeout(TIMEOUT, alice.agent.shutdown()).await.unwrap();
    tokio::time::timeout(TIMEOUT, bob.agent.shutdown()).await.unwrap();
    assert_ok!(alice_run.await.unwrap());
    assert_ok!(bob_run.await.unwrap());
}

#[tokio::test]
async fn test_unreachable_http_peer_is_queued() {
    let alice = Node::new("alice").await;
    let bob = Node::new("bob").await;
    alice.knows_reachable(&bob);

    // Bob never starts; dropping his agent releases the bound port
    drop(bob.agent);

    let outcome = alice
        .agent
        .send(
            Message::with_type(PING).unwrap(),
            &bob.verkey,
            Some(&bob.did),
            Some(&alice.verkey),
            None,
        )
        .await
        .unwrap();
    assert_eq!(outcome, SendOutcome::Queued { pending: 1 });
    assert_eq!(alice.agent.conductor().pending_count(&bob.verkey), 1);
}
