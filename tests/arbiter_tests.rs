//! Arbiter Tests: channel selection and connect/claim flows against scripted wallets
//!
//! These tests verify:
//! 1. Injected connect: chain gate, first account, error forwarding
//! 2. Bridge connect: handshake via event, idempotence, stale sessions
//! 3. Claim routing by authoritative channel
//! 4. clearWallet on provider/session changes

use serde_json::json;
use std::rc::Rc;
use wallet_bridge::core::paths::rpc;
use wallet_bridge::testing::{drain_outbound, next_outbound, run_local, MockFactory, MockProvider, MockSession};
use wallet_bridge::{BridgeConfig, ChannelKind, Command, Outbound, SessionEvent, WalletBridge, WalletError};

fn account(address: &str) -> Outbound {
    Outbound::ConnectResponse(Ok(Some(address.into())))
}

fn boot(provider: &Rc<MockProvider>, factory: &Rc<MockFactory>) -> (WalletBridge, futures::channel::mpsc::UnboundedReceiver<Outbound>) {
    WalletBridge::boot(BridgeConfig::default(), Some(provider.clone()), Some(Box::new(factory.clone())))
}

// =============================================================================
// Injected connect
// =============================================================================

#[test]
fn wrong_chain_answers_null_without_requesting_accounts() {
    run_local(async {
        let provider = MockProvider::new();
        provider.set_chain_id(4);
        let (bridge, mut rx) = boot(&provider, &MockFactory::new());

        bridge.send(Command::Connect);
        assert_eq!(next_outbound(&mut rx).await, Outbound::ConnectResponse(Ok(None)));
        assert_eq!(provider.calls(), vec![rpc::CHAIN_ID]);
    });
}

#[test]
fn matching_chain_answers_first_account() {
    run_local(async {
        let provider = MockProvider::new();
        provider.set_accounts(&["0xABC", "0x456"]);
        let (bridge, mut rx) = boot(&provider, &MockFactory::new());

        bridge.send(Command::Connect);
        assert_eq!(drain_outbound(&mut rx).await, vec![account("0xABC")]);
        assert_eq!(provider.calls(), vec![rpc::CHAIN_ID, rpc::REQUEST_ACCOUNTS]);
    });
}

#[test]
fn empty_account_list_answers_null() {
    run_local(async {
        let provider = MockProvider::new();
        provider.set_accounts(&[]);
        let (bridge, mut rx) = boot(&provider, &MockFactory::new());

        bridge.send(Command::Connect);
        assert_eq!(drain_outbound(&mut rx).await, vec![Outbound::ConnectResponse(Ok(None))]);
    });
}

#[test]
fn blank_first_account_answers_null_not_the_next_entry() {
    run_local(async {
        let provider = MockProvider::new();
        provider.set_accounts(&["", "0xSECOND"]);
        let (bridge, mut rx) = boot(&provider, &MockFactory::new());

        bridge.send(Command::Connect);
        assert_eq!(drain_outbound(&mut rx).await, vec![Outbound::ConnectResponse(Ok(None))]);
    });
}

#[test]
fn non_string_first_account_answers_null() {
    run_local(async {
        let provider = MockProvider::new();
        provider.answer(rpc::REQUEST_ACCOUNTS, Ok(json!([null, "0xB"])));
        let (bridge, mut rx) = boot(&provider, &MockFactory::new());

        bridge.send(Command::Connect);
        assert_eq!(drain_outbound(&mut rx).await, vec![Outbound::ConnectResponse(Ok(None))]);
    });
}

#[test]
fn user_rejection_is_the_connect_error() {
    run_local(async {
        let provider = MockProvider::new();
        provider.answer(rpc::REQUEST_ACCOUNTS, Err(WalletError::from_rpc(4001, "User rejected the request.")));
        let (bridge, mut rx) = boot(&provider, &MockFactory::new());

        bridge.send(Command::Connect);
        match next_outbound(&mut rx).await {
            Outbound::ConnectResponse(Err(error)) => assert!(error.is_user_rejection()),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(drain_outbound(&mut rx).await.is_empty());
    });
}

#[test]
fn chain_read_failure_is_the_connect_error() {
    run_local(async {
        let provider = MockProvider::new();
        provider.answer(rpc::CHAIN_ID, Err(WalletError::Transport("socket closed".into())));
        let (bridge, mut rx) = boot(&provider, &MockFactory::new());

        bridge.send(Command::Connect);
        assert_eq!(
            next_outbound(&mut rx).await,
            Outbound::ConnectResponse(Err(WalletError::Transport("socket closed".into())))
        );
        assert_eq!(provider.calls(), vec![rpc::CHAIN_ID]);
    });
}

#[test]
fn connect_without_provider_answers_no_provider() {
    run_local(async {
        let (bridge, mut rx) = WalletBridge::boot(BridgeConfig::default(), None, None);
        assert!(!bridge.flags().has_wallet);

        bridge.send(Command::Connect);
        assert_eq!(next_outbound(&mut rx).await, Outbound::ConnectResponse(Err(WalletError::NoProvider)));
    });
}

#[test]
fn connect_kills_live_bridge_session_first() {
    run_local(async {
        let provider = MockProvider::new();
        let factory = MockFactory::new();
        let (bridge, mut rx) = boot(&provider, &factory);

        bridge.send(Command::WalletConnect);
        drain_outbound(&mut rx).await;
        factory.session(0).complete_handshake(&["0xDEF"]);
        assert_eq!(drain_outbound(&mut rx).await, vec![account("0xDEF")]);
        assert_eq!(bridge.authoritative(), ChannelKind::Bridge);

        bridge.send(Command::Connect);
        assert_eq!(drain_outbound(&mut rx).await, vec![Outbound::ClearWallet, account("0xABC")]);
        assert_eq!(factory.session(0).kills(), 1);
        assert_eq!(bridge.authoritative(), ChannelKind::Injected);
    });
}

// =============================================================================
// Bridge connect
// =============================================================================

#[test]
fn wallet_connect_answers_when_handshake_completes() {
    run_local(async {
        let provider = MockProvider::new();
        let factory = MockFactory::new();
        let (bridge, mut rx) = boot(&provider, &factory);

        bridge.send(Command::WalletConnect);
        assert!(drain_outbound(&mut rx).await.is_empty());
        assert_eq!(factory.created(), 1);
        assert_eq!(factory.session(0).handshakes(), 1);

        factory.session(0).complete_handshake(&["0xDEF"]);
        assert_eq!(next_outbound(&mut rx).await, account("0xDEF"));
        assert!(provider.calls().is_empty());
    });
}

#[test]
fn handshake_with_blank_first_account_answers_null() {
    run_local(async {
        let factory = MockFactory::new();
        let (bridge, mut rx) = boot(&MockProvider::new(), &factory);

        bridge.send(Command::WalletConnect);
        drain_outbound(&mut rx).await;
        factory.session(0).complete_handshake(&["", "0xSECOND"]);
        assert_eq!(next_outbound(&mut rx).await, Outbound::ConnectResponse(Ok(None)));

        // Already connected: the stored accounts answer the same way.
        bridge.send(Command::WalletConnect);
        assert_eq!(drain_outbound(&mut rx).await, vec![Outbound::ConnectResponse(Ok(None))]);
        assert_eq!(factory.created(), 1);
    });
}

#[test]
fn wallet_connect_while_connected_reuses_session() {
    run_local(async {
        let factory = MockFactory::new();
        let (bridge, mut rx) = boot(&MockProvider::new(), &factory);

        bridge.send(Command::WalletConnect);
        drain_outbound(&mut rx).await;
        factory.session(0).complete_handshake(&["0xDEF"]);
        assert_eq!(drain_outbound(&mut rx).await, vec![account("0xDEF")]);

        bridge.send(Command::WalletConnect);
        bridge.send(Command::WalletConnect);
        assert_eq!(drain_outbound(&mut rx).await, vec![account("0xDEF"), account("0xDEF")]);
        assert_eq!(factory.created(), 1);
        assert_eq!(factory.session(0).handshakes(), 1);
    });
}

#[test]
fn discarded_handshake_never_answers() {
    run_local(async {
        let factory = MockFactory::new();
        let (bridge, mut rx) = boot(&MockProvider::new(), &factory);

        bridge.send(Command::WalletConnect);
        drain_outbound(&mut rx).await;
        bridge.send(Command::WalletConnect);
        drain_outbound(&mut rx).await;
        assert_eq!(factory.created(), 2);

        factory.session(0).complete_handshake(&["0xOLD"]);
        assert!(drain_outbound(&mut rx).await.is_empty());
        assert_eq!(bridge.authoritative(), ChannelKind::Injected);

        factory.session(1).complete_handshake(&["0xNEW"]);
        assert_eq!(drain_outbound(&mut rx).await, vec![account("0xNEW")]);
        assert_eq!(bridge.authoritative(), ChannelKind::Bridge);
    });
}

#[test]
fn wallet_connect_without_connector_is_unavailable() {
    run_local(async {
        let (bridge, mut rx) = WalletBridge::boot(BridgeConfig::default(), Some(MockProvider::new()), None);
        bridge.send(Command::WalletConnect);
        assert_eq!(next_outbound(&mut rx).await, Outbound::ConnectResponse(Err(WalletError::BridgeUnavailable)));
    });
}

#[test]
fn failed_handshake_start_is_the_connect_error() {
    run_local(async {
        let factory = MockFactory::new();
        factory.fail_next_create(WalletError::Session("relay unreachable".into()));
        let (bridge, mut rx) = boot(&MockProvider::new(), &factory);

        bridge.send(Command::WalletConnect);
        assert_eq!(
            next_outbound(&mut rx).await,
            Outbound::ConnectResponse(Err(WalletError::Session("relay unreachable".into())))
        );
    });
}

#[test]
fn session_event_errors_are_logged_only() {
    run_local(async {
        let factory = MockFactory::new();
        let (bridge, mut rx) = boot(&MockProvider::new(), &factory);

        bridge.send(Command::WalletConnect);
        drain_outbound(&mut rx).await;
        factory.session(0).emit(SessionEvent::Connect(Err("pairing rejected".into())));
        factory.session(0).emit(SessionEvent::Disconnect(Err("relay dropped".into())));
        assert!(drain_outbound(&mut rx).await.is_empty());
    });
}

#[test]
fn restored_session_is_authoritative_at_boot() {
    run_local(async {
        let restored = MockSession::paired(0, &["0xRESTORED"]);
        let factory = MockFactory::with_restorable(restored.clone());
        let (bridge, mut rx) = boot(&MockProvider::new(), &factory);
        assert_eq!(bridge.authoritative(), ChannelKind::Bridge);

        bridge.send(Command::WalletConnect);
        assert_eq!(drain_outbound(&mut rx).await, vec![account("0xRESTORED")]);
        assert_eq!(factory.created(), 0);
        assert_eq!(restored.handshakes(), 0);
    });
}

// =============================================================================
// Disconnect
// =============================================================================

#[test]
fn disconnect_without_session_is_silent() {
    run_local(async {
        let provider = MockProvider::new();
        let (bridge, mut rx) = boot(&provider, &MockFactory::new());

        bridge.send(Command::Disconnect);
        bridge.send(Command::Disconnect);
        assert!(drain_outbound(&mut rx).await.is_empty());
        assert!(provider.calls().is_empty());
    });
}

#[test]
fn disconnect_kills_live_session_and_clears_wallet() {
    run_local(async {
        let factory = MockFactory::new();
        let (bridge, mut rx) = boot(&MockProvider::new(), &factory);

        bridge.send(Command::WalletConnect);
        drain_outbound(&mut rx).await;
        factory.session(0).complete_handshake(&["0xDEF"]);
        drain_outbound(&mut rx).await;

        bridge.send(Command::Disconnect);
        assert_eq!(drain_outbound(&mut rx).await, vec![Outbound::ClearWallet]);
        assert_eq!(factory.session(0).kills(), 1);
        assert_eq!(bridge.authoritative(), ChannelKind::Injected);

        bridge.send(Command::Disconnect);
        assert!(drain_outbound(&mut rx).await.is_empty());
        assert_eq!(factory.session(0).kills(), 1);
    });
}

#[test]
fn remote_disconnect_clears_wallet() {
    run_local(async {
        let factory = MockFactory::new();
        let (bridge, mut rx) = boot(&MockProvider::new(), &factory);

        bridge.send(Command::WalletConnect);
        drain_outbound(&mut rx).await;
        factory.session(0).complete_handshake(&["0xDEF"]);
        drain_outbound(&mut rx).await;

        factory.session(0).remote_disconnect();
        assert_eq!(drain_outbound(&mut rx).await, vec![Outbound::ClearWallet]);
        assert_eq!(bridge.authoritative(), ChannelKind::Injected);
    });
}

// =============================================================================
// Claim
// =============================================================================

#[test]
fn claim_routes_to_connected_bridge() {
    run_local(async {
        let provider = MockProvider::new();
        let factory = MockFactory::new();
        let (bridge, mut rx) = boot(&provider, &factory);
        let tx = json!({"to": "0x531A67A6F75E93507a53276Eaf3677f895416d0e", "data": "0x4e71d92d"});

        bridge.send(Command::WalletConnect);
        drain_outbound(&mut rx).await;
        factory.session(0).complete_handshake(&["0xDEF"]);
        drain_outbound(&mut rx).await;

        bridge.send(Command::Claim(tx.clone()));
        assert_eq!(next_outbound(&mut rx).await, Outbound::ClaimResponse(Ok(json!("0xbridge"))));
        assert_eq!(factory.session(0).sent(), vec![tx]);
        assert!(provider.params_of(rpc::SEND_TRANSACTION).is_empty());
    });
}

#[test]
fn claim_falls_back_to_injected_provider() {
    run_local(async {
        let provider = MockProvider::new();
        let factory = MockFactory::new();
        let (bridge, mut rx) = boot(&provider, &factory);
        let tx = json!({"from": "0xABC", "data": "0x4e71d92d"});

        // A pending handshake does not make the bridge authoritative.
        bridge.send(Command::WalletConnect);
        drain_outbound(&mut rx).await;

        bridge.send(Command::Claim(tx.clone()));
        assert_eq!(next_outbound(&mut rx).await, Outbound::ClaimResponse(Ok(json!("0xinjected"))));
        assert_eq!(provider.params_of(rpc::SEND_TRANSACTION), vec![json!([tx])]);
        assert!(factory.session(0).sent().is_empty());
    });
}

#[test]
fn claim_rejection_is_the_claim_error() {
    run_local(async {
        let provider = MockProvider::new();
        provider.answer(rpc::SEND_TRANSACTION, Err(WalletError::from_rpc(4001, "User denied transaction signature.")));
        let (bridge, mut rx) = boot(&provider, &MockFactory::new());

        bridge.send(Command::Claim(json!({})));
        match next_outbound(&mut rx).await {
            Outbound::ClaimResponse(Err(error)) => assert_eq!(error.code(), 4001),
            other => panic!("unexpected: {:?}", other),
        }
    });
}

#[test]
fn claim_without_any_channel_answers_no_provider() {
    run_local(async {
        let (bridge, mut rx) = WalletBridge::boot(BridgeConfig::default(), None, Some(Box::new(MockFactory::new())));
        assert_eq!(bridge.authoritative(), ChannelKind::None);

        bridge.send(Command::Claim(json!({})));
        assert_eq!(next_outbound(&mut rx).await, Outbound::ClaimResponse(Err(WalletError::NoProvider)));
    });
}

#[test]
fn bridge_claim_failure_is_the_claim_error() {
    run_local(async {
        let restored = MockSession::paired(0, &["0xDEF"]);
        restored.set_send_result(Err(WalletError::from_rpc(4001, "User rejected the transaction")));
        let factory = MockFactory::with_restorable(restored.clone());
        let provider = MockProvider::new();
        let (bridge, mut rx) = boot(&provider, &factory);

        bridge.send(Command::Claim(json!({"value": "0x0"})));
        assert_eq!(
            next_outbound(&mut rx).await,
            Outbound::ClaimResponse(Err(WalletError::UserRejected("User rejected the transaction".into())))
        );
        assert_eq!(restored.sent().len(), 1);
        assert!(provider.calls().is_empty());
    });
}
