//! Exercises the concrete scenarios from `spec.md` §8 against mocked
//! `Wallet`/`SubClient` collaborators, the same style the teacher uses for
//! its `MockStateChainClient`-based engine tests.

use bridge::{
    error::BridgeError,
    model::{Memo, PartialSignature, StellarPayment},
    subclient::MockSubClient,
    transfer::{self, MintOutcome, ValidatorIdentity},
    wallet::MockWallet,
};

const IDENTITY: &str = "5FValidator";
const DEPOSIT_FEE: u64 = 100;

fn identity() -> ValidatorIdentity {
    ValidatorIdentity(IDENTITY.to_string())
}

fn payment(tx_hash: &str, memo: Memo, senders: Vec<(&str, u64)>) -> StellarPayment {
    StellarPayment {
        tx_hash: tx_hash.to_string(),
        memo,
        paging_token: format!("cursor-{tx_hash}"),
        senders: senders.into_iter().map(|(addr, amount)| (addr.to_string(), amount)).collect(),
    }
}

fn signature() -> PartialSignature {
    PartialSignature { signer_address: IDENTITY.to_string(), signature: vec![1, 2, 3], sequence_number: 42 }
}

#[tokio::test]
async fn happy_path_mint() {
    let mut wallet = MockWallet::new();
    let mut subclient = MockSubClient::new();

    subclient.expect_is_minted_already().returning(|_, _| Ok(false));
    subclient.expect_get_twin().withf(|id| *id == 7).returning(|_| Ok(bridge::model::Twin { id: 7, account: "5FTarget".into() }));
    subclient
        .expect_propose_or_vote_mint_transaction()
        .withf(|_, mint_id, target, amount| mint_id == "tx1" && target == "5FTarget" && *amount == 500)
        .returning(|_, _, _, _| Ok(()));

    wallet.expect_check_account().never();

    let p = payment("tx1", Memo::Text("twin_7".into()), vec![("GSENDER", 500)]);
    let outcome = transfer::handle_stellar_payment(&wallet, &subclient, &identity(), DEPOSIT_FEE, &p).await.unwrap();

    assert_eq!(outcome, MintOutcome::Minted { mint_id: "tx1".into(), target: "5FTarget".into(), amount: 500 });
}

#[tokio::test]
async fn below_deposit_fee_triggers_refund() {
    let mut wallet = MockWallet::new();
    let mut subclient = MockSubClient::new();

    subclient.expect_is_minted_already().returning(|_, _| Ok(false));
    subclient.expect_is_refunded_already().returning(|_, _| Ok(false));
    wallet.expect_create_refund_and_return_signature().returning(|_, _, _| Ok(signature()));
    subclient.expect_create_refund_transaction_or_add_sig().returning(|_, _, _, _, _| Ok(()));

    let p = payment("tx2", Memo::Text("twin_7".into()), vec![("GSENDER", 50)]);
    let outcome = transfer::handle_stellar_payment(&wallet, &subclient, &identity(), DEPOSIT_FEE, &p).await.unwrap();

    assert_eq!(outcome, MintOutcome::RefundInitiated { target: "GSENDER".into(), amount: 50 });
}

#[tokio::test]
async fn malformed_memo_triggers_refund() {
    let mut wallet = MockWallet::new();
    let mut subclient = MockSubClient::new();

    subclient.expect_is_minted_already().returning(|_, _| Ok(false));
    subclient.expect_is_refunded_already().returning(|_, _| Ok(false));
    wallet.expect_create_refund_and_return_signature().returning(|_, _, _| Ok(signature()));
    subclient.expect_create_refund_transaction_or_add_sig().returning(|_, _, _, _, _| Ok(()));

    let p = payment("tx3", Memo::Text("not a valid memo".into()), vec![("GSENDER", 500)]);
    let outcome = transfer::handle_stellar_payment(&wallet, &subclient, &identity(), DEPOSIT_FEE, &p).await.unwrap();

    assert_eq!(outcome, MintOutcome::RefundInitiated { target: "GSENDER".into(), amount: 500 });
}

#[tokio::test]
async fn return_memo_is_skipped() {
    let wallet = MockWallet::new();
    let subclient = MockSubClient::new();

    let p = payment("tx4", Memo::Return, vec![("GSENDER", 500)]);
    let outcome = transfer::handle_stellar_payment(&wallet, &subclient, &identity(), DEPOSIT_FEE, &p).await.unwrap();

    assert_eq!(outcome, MintOutcome::Skipped);
}

#[tokio::test]
async fn multi_sender_refunds_first_sender_only() {
    let mut wallet = MockWallet::new();
    let mut subclient = MockSubClient::new();

    subclient.expect_is_refunded_already().returning(|_, _| Ok(false));
    wallet
        .expect_create_refund_and_return_signature()
        .withf(|target, amount, _hash| target == "GFIRST" && *amount == 300)
        .returning(|_, _, _| Ok(signature()));
    subclient.expect_create_refund_transaction_or_add_sig().returning(|_, _, _, _, _| Ok(()));

    let p = payment("tx5", Memo::Text("twin_7".into()), vec![("GFIRST", 300), ("GSECOND", 700)]);
    let outcome = transfer::handle_stellar_payment(&wallet, &subclient, &identity(), DEPOSIT_FEE, &p).await.unwrap();

    assert_eq!(outcome, MintOutcome::RefundInitiated { target: "GFIRST".into(), amount: 300 });
}

#[tokio::test]
async fn burn_to_invalid_stellar_account_remints_source() {
    let mut wallet = MockWallet::new();
    let mut subclient = MockSubClient::new();

    subclient.expect_is_burned_already().withf(|id| *id == 7).returning(|_, _| Ok(false));
    wallet.expect_check_account().returning(|_| Err(BridgeError::InvalidTargetAccount("not-a-valid-addr".into())));
    subclient.expect_is_minted_already().withf(|_, mint_id| mint_id == "refund-7").returning(|_, _| Ok(false));
    subclient
        .expect_propose_or_vote_mint_transaction()
        .withf(|_, mint_id, target, amount| mint_id == "refund-7" && target == "5Fsrc" && *amount == 1000)
        .returning(|_, _, _, _| Ok(()));
    subclient.expect_set_burn_transaction_executed().withf(|_, id| *id == 7).returning(|_, _| Ok(()));

    transfer::handle_withdraw_created(&wallet, &subclient, &identity(), 7, "5Fsrc", "not-a-valid-addr", 1000).await.unwrap();
}

#[tokio::test]
async fn ready_with_zero_signatures_is_an_invariant_violation() {
    let wallet = MockWallet::new();
    let mut subclient = MockSubClient::new();

    subclient.expect_is_burned_already().returning(|_, _| Ok(false));
    subclient.expect_get_burn_transaction().returning(|_, _| {
        Ok(bridge::model::BurnTransaction { target: "5FTarget".into(), amount: 1000, signatures: vec![], sequence_number: 1 })
    });

    let result = transfer::handle_withdraw_ready(&wallet, &subclient, &identity(), 9).await;
    assert!(matches!(result, Err(BridgeError::ZeroSignatures(_))));
}

#[tokio::test]
async fn already_minted_is_a_distinguished_sentinel_error() {
    let wallet = MockWallet::new();
    let mut subclient = MockSubClient::new();

    subclient.expect_is_minted_already().returning(|_, _| Ok(true));

    let p = payment("tx6", Memo::Text("twin_7".into()), vec![("GSENDER", 500)]);
    let result = transfer::handle_stellar_payment(&wallet, &subclient, &identity(), DEPOSIT_FEE, &p).await;

    assert!(matches!(result, Err(BridgeError::AlreadyMinted(hash)) if hash == "tx6"));
    assert!(result.unwrap_err().is_already_done());
}

/// `spec.md` §8 invariant 1: replaying the same Stellar tx any number of
/// times must never result in more than one successful mint extrinsic.
#[tokio::test]
async fn replaying_the_same_stellar_payment_is_idempotent() {
    use std::sync::{atomic::{AtomicBool, Ordering}, Arc};

    let wallet = MockWallet::new();
    let mut subclient = MockSubClient::new();

    let already_minted = Arc::new(AtomicBool::new(false));

    let read_flag = already_minted.clone();
    subclient.expect_is_minted_already().returning(move |_, _| Ok(read_flag.load(Ordering::SeqCst)));
    subclient.expect_get_twin().returning(|_| Ok(bridge::model::Twin { id: 7, account: "5FTarget".into() }));

    let write_flag = already_minted.clone();
    subclient
        .expect_propose_or_vote_mint_transaction()
        .times(1) // must never be called a second time on replay
        .returning(move |_, _, _, _| {
            write_flag.store(true, Ordering::SeqCst);
            Ok(())
        });

    let p = payment("tx-replay", Memo::Text("twin_7".into()), vec![("GSENDER", 500)]);

    let first = transfer::handle_stellar_payment(&wallet, &subclient, &identity(), DEPOSIT_FEE, &p).await.unwrap();
    assert_eq!(first, MintOutcome::Minted { mint_id: "tx-replay".into(), target: "5FTarget".into(), amount: 500 });

    let second = transfer::handle_stellar_payment(&wallet, &subclient, &identity(), DEPOSIT_FEE, &p).await;
    assert!(matches!(second, Err(BridgeError::AlreadyMinted(_))));
}

/// `spec.md` §8 invariant 2: replaying `WithdrawReady` must never result in
/// more than one successful Stellar payout for the same burn id.
#[tokio::test]
async fn replaying_withdraw_ready_is_idempotent() {
    use std::sync::{atomic::{AtomicBool, Ordering}, Arc};

    let mut wallet = MockWallet::new();
    let mut subclient = MockSubClient::new();

    let already_burned = Arc::new(AtomicBool::new(false));

    let read_flag = already_burned.clone();
    subclient.expect_is_burned_already().returning(move |_, _| Ok(read_flag.load(Ordering::SeqCst)));
    subclient.expect_get_burn_transaction().returning(|_, _| {
        Ok(bridge::model::BurnTransaction { target: "5FTarget".into(), amount: 1000, signatures: vec![signature()], sequence_number: 1 })
    });
    wallet.expect_create_payment_with_signatures_and_submit().times(1).returning(|_, _, _, _, _| Ok(()));

    let write_flag = already_burned.clone();
    subclient.expect_set_burn_transaction_executed().times(1).returning(move |_, _| {
        write_flag.store(true, Ordering::SeqCst);
        Ok(())
    });

    transfer::handle_withdraw_ready(&wallet, &subclient, &identity(), 9).await.unwrap();

    let replay = transfer::handle_withdraw_ready(&wallet, &subclient, &identity(), 9).await;
    assert!(matches!(replay, Err(BridgeError::AlreadyBurned(9))));
}

/// `spec.md` §8 invariant 3: replaying `RefundReady` must never result in
/// more than one successful Stellar refund payout for the same hash.
#[tokio::test]
async fn replaying_refund_ready_is_idempotent() {
    use std::sync::{atomic::{AtomicBool, Ordering}, Arc};

    let mut wallet = MockWallet::new();
    let mut subclient = MockSubClient::new();

    let already_refunded = Arc::new(AtomicBool::new(false));

    let read_flag = already_refunded.clone();
    subclient.expect_is_refunded_already().returning(move |_, _| Ok(read_flag.load(Ordering::SeqCst)));
    subclient.expect_get_refund_transaction().returning(|_, _| {
        Ok(bridge::model::RefundTransaction { target: "GSENDER".into(), amount: 500, signatures: vec![signature()], sequence_number: 1 })
    });
    wallet.expect_create_refund_payment_with_signatures_and_submit().times(1).returning(|_, _, _, _, _| Ok(()));

    let write_flag = already_refunded.clone();
    subclient.expect_set_refund_transaction_executed().times(1).returning(move |_, _| {
        write_flag.store(true, Ordering::SeqCst);
        Ok(())
    });

    transfer::handle_refund_ready(&wallet, &subclient, &identity(), "tx-refund").await.unwrap();

    let replay = transfer::handle_refund_ready(&wallet, &subclient, &identity(), "tx-refund").await;
    assert!(matches!(replay, Err(BridgeError::AlreadyRefunded(hash)) if hash == "tx-refund"));
}

#[tokio::test]
async fn withdraw_expired_without_source_and_invalid_target_is_fatal() {
    let mut wallet = MockWallet::new();
    let subclient = MockSubClient::new();

    wallet.expect_check_account().returning(|_| Err(BridgeError::InvalidTargetAccount("bad".into())));

    let result = transfer::handle_withdraw_expired(&wallet, &subclient, &identity(), 11, "bad", 1000).await;
    assert!(result.is_err());
}
