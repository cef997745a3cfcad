//! Receiver orchestrator
//!
//! The [`Hub`] owns the receiver side of every channel: it derives channel
//! keys, checks funding outputs against the bitcoin node, authorizes
//! payment targets through the directory and persists each committed
//! transition with a compare-and-swap. Within one operation it reads the
//! pre-state, runs the pure transition in memory and hands both states to
//! the store; either the swap commits a valid transition or nothing
//! changes. No cross-channel locks are taken.

pub mod directory;
pub mod models;
pub mod payment;

pub use directory::{Directory, StaticDirectory};
pub use payment::{JsonDecoder, PaymentDecoder, PaymentDetails, PaymentEnvelope};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, Network};
use rand::RngCore;
use tracing::{debug, info, warn};

use crate::channel::receiver::Receiver as ReceiverRole;
use crate::channel::script;
use crate::channel::state::{check_supported_address, ChannelParams, SharedState};
use crate::channel::transition::FundingOutput;
use crate::errors::{ChannelError, Error, FundingError, Result};
use crate::keys::KeySource;
use crate::node::{btc_to_sats, BitcoinNode};
use crate::store::{Record, Storage};
use crate::types::{ChannelId, CHANNEL_ID_LEN, CLOSE_WINDOW_BLOCKS, MIN_FUNDING_CONF};

use models::{
    CloseRequest, CloseResponse, CreateRequest, CreateResponse, OpenRequest, OpenResponse,
    SendRequest, SendResponse, StatusRequest, StatusResponse, ValidateRequest, ValidateResponse,
};

/// Funding-acceptance policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Minimum confirmations before funding is accepted
    pub min_funding_conf: u32,
    /// Block margin kept between the funding depth and the refund timeout
    pub close_window: u16,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { min_funding_conf: MIN_FUNDING_CONF, close_window: CLOSE_WINDOW_BLOCKS }
    }
}

/// The receiver-side channel orchestrator
///
/// Generic over its collaborators: the persistence store, the bitcoin node
/// client, the payment directory and (optionally) the payment decoder. All
/// configuration flows in through [`Hub::new`]; the hub holds no global
/// state and its operations take `&self`, so one instance serves concurrent
/// callers.
pub struct Hub<S, N, D, P = JsonDecoder> {
    net: Network,
    params: ChannelParams,
    config: HubConfig,
    keys: KeySource,
    store: S,
    node: N,
    directory: D,
    decoder: P,
    receiver_output: Address<NetworkUnchecked>,
}

impl<S, N, D> Hub<S, N, D>
where
    S: Storage,
    N: BitcoinNode,
    D: Directory,
{
    /// Creates a hub with the JSON payment decoder
    ///
    /// # Errors
    /// * [`ChannelError::UnsupportedAddress`] / [`ChannelError::WrongNetwork`] -
    ///   if the receiver payout address is unusable on `net`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        net: Network,
        params: ChannelParams,
        config: HubConfig,
        keys: KeySource,
        store: S,
        node: N,
        directory: D,
        receiver_output: Address<NetworkUnchecked>,
    ) -> Result<Self> {
        check_supported_address(net, &receiver_output)?;
        Ok(Self {
            net,
            params,
            config,
            keys,
            store,
            node,
            directory,
            decoder: JsonDecoder,
            receiver_output,
        })
    }
}

impl<S, N, D, P> Hub<S, N, D, P>
where
    S: Storage,
    N: BitcoinNode,
    D: Directory,
    P: PaymentDecoder,
{
    /// Swaps in a custom payment decoder
    pub fn with_decoder<Q: PaymentDecoder>(self, decoder: Q) -> Hub<S, N, D, Q> {
        Hub {
            net: self.net,
            params: self.params,
            config: self.config,
            keys: self.keys,
            store: self.store,
            node: self.node,
            directory: self.directory,
            decoder,
            receiver_output: self.receiver_output,
        }
    }

    /// Creates a channel for a sender
    ///
    /// Reserves a fresh HD key index, derives the receiver key into a new
    /// state, persists the record under a random channel id and returns the
    /// P2SH funding address the sender must pay.
    pub fn create(&self, req: CreateRequest) -> Result<CreateResponse> {
        if !req.sender_pubkey.compressed {
            return Err(ChannelError::InvalidPublicKey.into());
        }

        let mut state = SharedState::new(self.net, self.params);
        state.sender_pubkey = Some(req.sender_pubkey);
        state.sender_output = Some(req.sender_output);
        state.receiver_output = Some(self.receiver_output.clone());

        let key_path = self.store.reserve_key_path()?;
        let (secret_key, _) = self.keys.derive(key_path)?;
        let role = ReceiverRole::accept(state, secret_key)?;

        let id = gen_channel_id();
        self.store.create(Record { id: id.clone(), key_path, state: role.state().clone() })?;

        let (_, funding_addr) = script::funding_address(role.state())?;
        info!(channel = %id, key_path, "channel created");

        let state = role.into_state();
        let receiver_pubkey =
            state.receiver_pubkey.ok_or(ChannelError::MissingField("receiver_pubkey"))?;
        Ok(CreateResponse {
            id,
            timeout: state.timeout,
            fee: state.fee,
            receiver_pubkey,
            receiver_output: self.receiver_output.clone(),
            funding_address: funding_addr.as_unchecked().clone(),
        })
    }

    /// Opens a channel once its funding output is confirmed
    ///
    /// Asserts against the node that the named UTXO exists, is not a
    /// coinbase, pays exactly the expected funding address and sits inside
    /// the accepted confirmation window, then validates the sender's
    /// zero-balance signature and commits the open state.
    pub fn open(&self, req: OpenRequest) -> Result<OpenResponse> {
        let (record, mut role) = self.load(&req.id)?;
        let pre_state = record.state;

        let (_, expected_addr) = script::funding_address(role.state())?;

        let txout = self
            .node
            .get_tx_out(&req.txid, req.vout, false)?
            .ok_or(FundingError::UtxoMissing)?;
        if txout.coinbase {
            return Err(FundingError::Coinbase.into());
        }
        if txout.addresses.len() != 1 || txout.addresses[0] != *expected_addr.as_unchecked() {
            return Err(FundingError::WrongAddress.into());
        }

        let confirmations = txout.confirmations;
        if confirmations < self.config.min_funding_conf {
            return Err(FundingError::TooFewConfirmations {
                confirmations,
                required: self.config.min_funding_conf,
            }
            .into());
        }
        let allowed = u32::from(role.state().timeout.saturating_sub(self.config.close_window));
        if confirmations > allowed {
            return Err(FundingError::TooManyConfirmations { confirmations, allowed }.into());
        }

        let tip_height = self.node.get_block_height(&txout.best_block)?;
        let height = (tip_height + 1).saturating_sub(u64::from(confirmations));

        let funding = FundingOutput {
            txid: req.txid,
            vout: req.vout,
            amount: btc_to_sats(txout.value),
            height,
        };
        role.open(funding, req.sender_sig)?;

        self.store.update(&req.id, &pre_state, role.state(), None)?;
        info!(
            channel = %req.id,
            txid = %req.txid,
            amount = role.state().funding_amount,
            height,
            "channel open"
        );
        Ok(OpenResponse {})
    }

    /// Pre-flight check of a payment without committing anything
    ///
    /// Combines signature validation and directory authorization into one
    /// boolean; only infrastructure failures surface as errors.
    pub fn validate(&self, req: ValidateRequest) -> Result<ValidateResponse> {
        let (_, role) = self.load(&req.id)?;

        let details = match self.decoder.decode(&req.payment) {
            Ok(details) => details,
            Err(Error::InvalidPayment(reason)) => {
                debug!(channel = %req.id, %reason, "payment envelope rejected");
                return Ok(ValidateResponse { valid: false });
            }
            Err(e) => return Err(e),
        };

        if !role.validate(details.amount, &req.sender_sig)? {
            return Ok(ValidateResponse { valid: false });
        }
        let valid = self.directory.has_target(&details.target)?;
        Ok(ValidateResponse { valid })
    }

    /// Commits a payment
    ///
    /// Decodes the envelope, requires the target to be known, validates the
    /// signature through the script engine inside the role, and atomically
    /// persists the new state together with the payment blob.
    pub fn send(&self, req: SendRequest) -> Result<SendResponse> {
        let (record, mut role) = self.load(&req.id)?;
        let pre_state = record.state;

        let details = self.decoder.decode(&req.payment)?;
        if !self.directory.has_target(&details.target)? {
            return Err(Error::UnknownTarget(details.target));
        }

        role.send(details.amount, req.sender_sig, Some(&req.payment))?;

        self.store.update(&req.id, &pre_state, role.state(), Some(&req.payment))?;
        info!(
            channel = %req.id,
            amount = details.amount,
            balance = role.state().balance,
            count = role.state().count,
            "payment committed"
        );
        Ok(SendResponse {})
    }

    /// Closes a channel at its current balance
    ///
    /// Commits the closing state first, then broadcasts. A broadcast
    /// failure after the commit is reported, not reverted: the stored state
    /// still yields the same raw transaction for rebroadcast.
    pub fn close(&self, req: CloseRequest) -> Result<CloseResponse> {
        let (record, mut role) = self.load(&req.id)?;
        let pre_state = record.state;

        let close_tx = role.close()?;
        self.store.update(&req.id, &pre_state, role.state(), None)?;

        match self.node.send_raw_transaction(&close_tx) {
            Ok(txid) => {
                info!(channel = %req.id, %txid, balance = role.state().balance, "closure broadcast");
            }
            Err(e) => {
                warn!(channel = %req.id, error = %e, "closure broadcast failed; state committed, rebroadcast possible");
                return Err(e.into());
            }
        }
        Ok(CloseResponse { close_tx })
    }

    /// Read-only channel status
    pub fn status(&self, req: StatusRequest) -> Result<StatusResponse> {
        let record =
            self.store.get(&req.id)?.ok_or_else(|| Error::UnknownChannel(req.id.clone()))?;
        Ok(StatusResponse {
            status: record.state.status,
            balance: record.state.balance,
            payments_hash: record.state.payments_hash,
        })
    }

    /// Fetches a channel's shared state
    pub fn get(&self, id: &str) -> Result<Option<SharedState>> {
        Ok(self.store.get(id)?.map(|record| record.state))
    }

    /// Lists all channel records
    pub fn list(&self) -> Result<Vec<Record>> {
        Ok(self.store.list()?)
    }

    /// Lists a channel's payment blobs in commit order
    pub fn list_payments(&self, id: &str) -> Result<Vec<Vec<u8>>> {
        Ok(self.store.list_payments(id)?)
    }

    /// Loads a record and rebinds it to the re-derived channel key
    fn load(&self, id: &str) -> Result<(Record, ReceiverRole)> {
        let record = self.store.get(id)?.ok_or_else(|| Error::UnknownChannel(id.to_string()))?;
        let (secret_key, _) = self.keys.derive(record.key_path)?;
        let role = ReceiverRole::new(record.state.clone(), secret_key);
        Ok((record, role))
    }
}

/// Generates a channel id: 32 random bytes, url-safe base64, no padding
fn gen_channel_id() -> ChannelId {
    let mut buf = [0u8; CHANNEL_ID_LEN];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use bitcoin::hashes::Hash;
    use bitcoin::{BlockHash, Txid};

    use super::*;
    use crate::channel::sender::Sender;
    use crate::channel::test_utils::{p2pkh_output, sender_keys, test_params};
    use crate::errors::NodeError;
    use crate::keys::KeySource;
    use crate::node::TxOutInfo;
    use crate::store::MemoryStore;

    /// Scripted node: a map of UTXOs plus a broadcast log
    #[derive(Default)]
    pub struct FakeNode {
        utxos: Mutex<HashMap<(Txid, u32), TxOutInfo>>,
        heights: Mutex<HashMap<BlockHash, u64>>,
        broadcasts: Mutex<Vec<Vec<u8>>>,
    }

    impl FakeNode {
        pub fn add_utxo(&self, txid: Txid, vout: u32, info: TxOutInfo) {
            self.utxos.lock().expect("lock").insert((txid, vout), info);
        }

        pub fn set_height(&self, block: BlockHash, height: u64) {
            self.heights.lock().expect("lock").insert(block, height);
        }

        pub fn broadcast_count(&self) -> usize {
            self.broadcasts.lock().expect("lock").len()
        }
    }

    impl BitcoinNode for FakeNode {
        fn get_tx_out(
            &self,
            txid: &Txid,
            vout: u32,
            _include_mempool: bool,
        ) -> std::result::Result<Option<TxOutInfo>, NodeError> {
            Ok(self.utxos.lock().expect("lock").get(&(*txid, vout)).cloned())
        }

        fn get_block_height(
            &self,
            block_hash: &BlockHash,
        ) -> std::result::Result<u64, NodeError> {
            Ok(*self.heights.lock().expect("lock").get(block_hash).unwrap_or(&1_000))
        }

        fn send_raw_transaction(&self, raw: &[u8]) -> std::result::Result<Txid, NodeError> {
            let tx: bitcoin::Transaction = bitcoin::consensus::encode::deserialize(raw)
                .map_err(|e| NodeError::Rpc(e.to_string()))?;
            self.broadcasts.lock().expect("lock").push(raw.to_vec());
            Ok(tx.compute_txid())
        }
    }

    type TestHub = Hub<MemoryStore, FakeNode, StaticDirectory>;

    fn test_hub() -> TestHub {
        Hub::new(
            Network::Regtest,
            test_params(),
            HubConfig::default(),
            KeySource::from_seed(Network::Regtest, &[7u8; 64]).expect("seed"),
            MemoryStore::new(),
            FakeNode::default(),
            StaticDirectory::new(["books"]),
            p2pkh_output(12),
        )
        .expect("hub builds")
    }

    fn funding_txid() -> Txid {
        Txid::from_byte_array([7u8; 32])
    }

    /// Creates a channel and runs the sender's side of the handshake
    fn created(hub: &TestHub) -> (Sender, CreateResponse) {
        let (sender_sk, sender_pubkey) = sender_keys();
        let mut sender =
            Sender::open_channel(Network::Regtest, test_params(), sender_sk, p2pkh_output(11))
                .expect("open_channel");

        let resp = hub
            .create(CreateRequest { sender_pubkey, sender_output: p2pkh_output(11) })
            .expect("create");
        sender
            .received_pub_key(resp.receiver_pubkey, resp.receiver_output.clone())
            .expect("received_pub_key");
        (sender, resp)
    }

    /// Funds the fake chain and opens the channel on both sides
    fn opened(hub: &TestHub) -> (Sender, CreateResponse) {
        let (mut sender, resp) = created(hub);

        hub.node.add_utxo(
            funding_txid(),
            0,
            TxOutInfo {
                value: 0.01,
                confirmations: 6,
                best_block: BlockHash::all_zeros(),
                coinbase: false,
                addresses: vec![resp.funding_address.clone()],
            },
        );

        let funding = FundingOutput {
            txid: funding_txid(),
            vout: 0,
            amount: 1_000_000,
            height: 995,
        };
        let sig = sender.funding_tx_mined(funding).expect("funding_tx_mined");

        hub.open(OpenRequest { id: resp.id.clone(), txid: funding_txid(), vout: 0, sender_sig: sig })
            .expect("open");
        (sender, resp)
    }

    #[test]
    fn test_create_persists_and_returns_funding_address() {
        let hub = test_hub();
        let (_, resp) = created(&hub);

        assert_eq!(resp.id.len(), 43);
        assert_eq!(resp.timeout, 144);
        assert_eq!(resp.fee, 75_000);

        let state = hub.get(&resp.id).expect("get").expect("present");
        assert_eq!(state.status, crate::channel::state::Status::PreInfoGathered);
        assert_eq!(state.receiver_pubkey, Some(resp.receiver_pubkey));

        // The sender derives the same funding address from its mirror.
        let checked = resp
            .funding_address
            .require_network(Network::Regtest)
            .expect("funding address is for regtest");
        assert_eq!(checked.address_type(), Some(bitcoin::address::AddressType::P2sh));
    }

    #[test]
    fn test_create_assigns_fresh_key_paths() {
        let hub = test_hub();
        let (_, a) = created(&hub);
        let (_, b) = created(&hub);

        assert_ne!(a.id, b.id);
        assert_ne!(a.receiver_pubkey, b.receiver_pubkey);
    }

    #[test]
    fn test_open_happy_path() {
        let hub = test_hub();
        let (_, resp) = opened(&hub);

        let state = hub.get(&resp.id).expect("get").expect("present");
        assert_eq!(state.status, crate::channel::state::Status::Open);
        assert_eq!(state.funding_amount, 1_000_000);
        assert_eq!(state.funding_txid, Some(funding_txid()));
        // containing block of a 6-conf tx under tip 1000
        assert_eq!(state.block_height, 995);
    }

    #[test]
    fn test_open_rejects_missing_utxo() {
        let hub = test_hub();
        let (_, resp) = created(&hub);

        let err = hub
            .open(OpenRequest { id: resp.id, txid: funding_txid(), vout: 0, sender_sig: vec![] })
            .err()
            .expect("must fail");
        assert_eq!(err, Error::Funding(FundingError::UtxoMissing));
    }

    #[test]
    fn test_open_rejects_coinbase_and_wrong_address() {
        let hub = test_hub();
        let (_, resp) = created(&hub);

        hub.node.add_utxo(
            funding_txid(),
            0,
            TxOutInfo {
                value: 0.01,
                confirmations: 6,
                best_block: BlockHash::all_zeros(),
                coinbase: true,
                addresses: vec![resp.funding_address.clone()],
            },
        );
        let err = hub
            .open(OpenRequest {
                id: resp.id.clone(),
                txid: funding_txid(),
                vout: 0,
                sender_sig: vec![],
            })
            .err()
            .expect("must fail");
        assert_eq!(err, Error::Funding(FundingError::Coinbase));

        hub.node.add_utxo(
            funding_txid(),
            0,
            TxOutInfo {
                value: 0.01,
                confirmations: 6,
                best_block: BlockHash::all_zeros(),
                coinbase: false,
                addresses: vec![p2pkh_output(33)],
            },
        );
        let err = hub
            .open(OpenRequest { id: resp.id, txid: funding_txid(), vout: 0, sender_sig: vec![] })
            .err()
            .expect("must fail");
        assert_eq!(err, Error::Funding(FundingError::WrongAddress));
    }

    #[test]
    fn test_open_enforces_confirmation_window() {
        let hub = test_hub();
        let (_, resp) = created(&hub);

        let utxo = |confirmations| TxOutInfo {
            value: 0.01,
            confirmations,
            best_block: BlockHash::all_zeros(),
            coinbase: false,
            addresses: vec![resp.funding_address.clone()],
        };

        hub.node.add_utxo(funding_txid(), 0, utxo(5));
        let err = hub
            .open(OpenRequest {
                id: resp.id.clone(),
                txid: funding_txid(),
                vout: 0,
                sender_sig: vec![],
            })
            .err()
            .expect("must fail");
        assert_eq!(
            err,
            Error::Funding(FundingError::TooFewConfirmations { confirmations: 5, required: 6 })
        );

        // timeout 144 - close window 24 = 120
        hub.node.add_utxo(funding_txid(), 0, utxo(121));
        let err = hub
            .open(OpenRequest { id: resp.id, txid: funding_txid(), vout: 0, sender_sig: vec![] })
            .err()
            .expect("must fail");
        assert_eq!(
            err,
            Error::Funding(FundingError::TooManyConfirmations { confirmations: 121, allowed: 120 })
        );
    }

    #[test]
    fn test_unknown_channel() {
        let hub = test_hub();
        assert_eq!(
            hub.status(StatusRequest { id: "nope".to_string() }).err().expect("must fail"),
            Error::UnknownChannel("nope".to_string())
        );
    }

    #[test]
    fn test_close_broadcasts_committed_closure() {
        let hub = test_hub();
        let (mut sender, resp) = opened(&hub);

        let sig = sender.prepare_send(100_000).expect("prepare_send");
        let payment = PaymentEnvelope {
            amount: 100_000,
            target: "books".to_string(),
            nonce: vec![1],
        }
        .to_bytes()
        .expect("envelope");
        hub.send(SendRequest { id: resp.id.clone(), payment, sender_sig: sig }).expect("send");

        let close = hub.close(CloseRequest { id: resp.id.clone() }).expect("close");
        assert!(!close.close_tx.is_empty());
        assert_eq!(hub.node.broadcast_count(), 1);

        let status = hub.status(StatusRequest { id: resp.id }).expect("status");
        assert_eq!(status.status, crate::channel::state::Status::Closing);
        assert_eq!(status.balance, 100_000);
    }

    #[test]
    fn test_send_rejects_unknown_target() {
        let hub = test_hub();
        let (mut sender, resp) = opened(&hub);

        let sig = sender.prepare_send(100_000).expect("prepare_send");
        let payment = PaymentEnvelope {
            amount: 100_000,
            target: "unlisted".to_string(),
            nonce: vec![],
        }
        .to_bytes()
        .expect("envelope");

        let err = hub
            .send(SendRequest { id: resp.id.clone(), payment, sender_sig: sig })
            .err()
            .expect("must fail");
        assert_eq!(err, Error::UnknownTarget("unlisted".to_string()));
        assert!(hub.list_payments(&resp.id).expect("payments").is_empty());
    }

    #[test]
    fn test_validate_combines_signature_and_target() {
        let hub = test_hub();
        let (mut sender, resp) = opened(&hub);
        let sig = sender.prepare_send(100_000).expect("prepare_send");

        let good = PaymentEnvelope { amount: 100_000, target: "books".to_string(), nonce: vec![] }
            .to_bytes()
            .expect("envelope");
        let unknown_target =
            PaymentEnvelope { amount: 100_000, target: "unlisted".to_string(), nonce: vec![] }
                .to_bytes()
                .expect("envelope");
        let wrong_amount =
            PaymentEnvelope { amount: 50_000, target: "books".to_string(), nonce: vec![] }
                .to_bytes()
                .expect("envelope");

        let check = |payment: Vec<u8>, sender_sig: Vec<u8>| {
            hub.validate(ValidateRequest { id: resp.id.clone(), payment, sender_sig })
                .expect("validate")
                .valid
        };

        assert!(check(good.clone(), sig.clone()));
        assert!(!check(unknown_target, sig.clone()));
        assert!(!check(wrong_amount, sig.clone()));
        assert!(!check(b"not an envelope".to_vec(), sig.clone()));

        let mut bad_sig = sig;
        bad_sig[9] ^= 0x10;
        assert!(!check(good, bad_sig));

        // validation committed nothing
        let status = hub.status(StatusRequest { id: resp.id.clone() }).expect("status");
        assert_eq!(status.balance, 0);
        assert!(hub.list_payments(&resp.id).expect("payments").is_empty());
    }
}
