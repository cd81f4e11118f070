//! A simulated Ethereum app for integration tests.
//!
//! The device keeps one secp256k1 key per derivation path, reassembles
//! chunked requests, and answers the way the app does: `[v, r, s]` with the
//! legacy `v` truncated to its low byte.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use alloy_primitives::{Address, B256, eip191_hash_message, keccak256};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::FieldBytes;
use ledgereth_core::{Channel, DerivationPath, Result, Signature, Transaction, TransactionType};

const SW_OK: [u8; 2] = [0x90, 0x00];
const SW_DENIED: [u8; 2] = [0x69, 0x85];
const SW_INS_NOT_SUPPORTED: [u8; 2] = [0x6D, 0x00];
const SW_INVALID_DATA: [u8; 2] = [0x6A, 0x80];

#[derive(Debug)]
struct State {
    version: [u8; 4],
    decline: bool,
    frames: Vec<Vec<u8>>,
    pending: Vec<u8>,
    opened: usize,
    closed: usize,
}

/// Cloneable handle to one simulated device.
#[derive(Debug, Clone)]
pub struct MockDevice {
    state: Rc<RefCell<State>>,
}

impl MockDevice {
    /// A device reporting app version 9.9.9.
    pub fn new() -> Self {
        Self::with_version(9, 9, 9)
    }

    pub fn with_version(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                version: [0x01, major, minor, patch],
                decline: false,
                frames: Vec::new(),
                pending: Vec::new(),
                opened: 0,
                closed: 0,
            })),
        }
    }

    /// Makes the user reject every signing request.
    pub fn declining(self) -> Self {
        self.state.borrow_mut().decline = true;
        self
    }

    /// A closure opening channels to this device.
    pub fn opener(&self) -> impl Fn() -> Result<Box<dyn Channel>> + 'static {
        let device = self.clone();
        move || {
            device.state.borrow_mut().opened += 1;
            Ok(Box::new(device.clone()) as Box<dyn Channel>)
        }
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.state.borrow().frames.clone()
    }

    /// Frames sent with the given INS byte.
    pub fn frames_with(&self, ins: u8) -> Vec<Vec<u8>> {
        self.frames()
            .into_iter()
            .filter(|frame| frame[1] == ins)
            .collect()
    }

    pub fn opened(&self) -> usize {
        self.state.borrow().opened
    }

    pub fn closed(&self) -> usize {
        self.state.borrow().closed
    }

    /// The key the device holds for `path`.
    pub fn key(path: &DerivationPath) -> SigningKey {
        let seed = keccak256(path.encode());
        SigningKey::from_bytes(&FieldBytes::from(seed.0)).expect("valid scalar")
    }

    /// The address the device derives for `path`.
    pub fn address(path: &DerivationPath) -> Address {
        address_of(Self::key(path).verifying_key())
    }

    fn handle(&self, frame: &[u8]) -> Vec<u8> {
        let (ins, p1, p2) = (frame[1], frame[2], frame[3]);
        let data = frame.get(5..5 + usize::from(frame[4])).unwrap_or_default();

        match ins {
            0x06 => {
                let mut out = self.state.borrow().version.to_vec();
                out.extend_from_slice(&SW_OK);
                out
            }
            0x02 => self.get_address(data, p1, p2),
            0x04 | 0x08 => {
                let mut state = self.state.borrow_mut();
                if p1 == 0x00 {
                    state.pending.clear();
                }
                state.pending.extend_from_slice(data);
                let pending = state.pending.clone();
                drop(state);

                let Some((path, body)) = split_path(&pending) else {
                    return SW_OK.to_vec();
                };
                let complete = if ins == 0x04 {
                    transaction_complete(body)
                } else {
                    message_complete(body)
                };
                if !complete {
                    return SW_OK.to_vec();
                }

                self.state.borrow_mut().pending.clear();
                if ins == 0x04 {
                    self.sign_transaction(&path, body)
                } else {
                    self.sign_message(&path, &body[4..])
                }
            }
            0x0C => {
                let Some((path, hashes)) = split_path(data) else {
                    return SW_INVALID_DATA.to_vec();
                };
                if hashes.len() != 64 {
                    return SW_INVALID_DATA.to_vec();
                }
                let mut preimage = vec![0x19, 0x01];
                preimage.extend_from_slice(hashes);
                self.sign(&path, keccak256(preimage), |parity| 27 + parity)
            }
            _ => SW_INS_NOT_SUPPORTED.to_vec(),
        }
    }

    fn get_address(&self, data: &[u8], p1: u8, p2: u8) -> Vec<u8> {
        let Some((path, _)) = split_path(data) else {
            return SW_INVALID_DATA.to_vec();
        };
        if p1 == 0x01 && self.state.borrow().decline {
            return SW_DENIED.to_vec();
        }

        let key = Self::key(&path);
        let public_key = key.verifying_key().to_encoded_point(false);
        let address = hex::encode(address_of(key.verifying_key()));

        let mut out = vec![public_key.as_bytes().len() as u8];
        out.extend_from_slice(public_key.as_bytes());
        out.push(address.len() as u8);
        out.extend_from_slice(address.as_bytes());
        if p2 == 0x01 {
            out.extend_from_slice(&[0x77; 32]);
        }
        out.extend_from_slice(&SW_OK);
        out
    }

    fn sign_transaction(&self, path: &DerivationPath, body: &[u8]) -> Vec<u8> {
        let Ok(tx) = Transaction::decode(body) else {
            return SW_INVALID_DATA.to_vec();
        };
        let v = move |parity: u8| match (tx.transaction_type(), tx.chain_id()) {
            (TransactionType::Legacy, Some(chain_id)) => {
                (chain_id * 2 + 35 + u64::from(parity)) as u8
            }
            (TransactionType::Legacy, None) => 27 + parity,
            _ => parity,
        };
        self.sign(path, keccak256(body), v)
    }

    fn sign_message(&self, path: &DerivationPath, message: &[u8]) -> Vec<u8> {
        self.sign(path, eip191_hash_message(message), |parity| 27 + parity)
    }

    fn sign(&self, path: &DerivationPath, hash: B256, v: impl Fn(u8) -> u8) -> Vec<u8> {
        if self.state.borrow().decline {
            return SW_DENIED.to_vec();
        }

        let (signature, recovery) = Self::key(path)
            .sign_prehash_recoverable(hash.as_slice())
            .expect("signing succeeds");

        let mut out = vec![v(u8::from(recovery.is_y_odd()))];
        out.extend_from_slice(&signature.to_bytes());
        out.extend_from_slice(&SW_OK);
        out
    }
}

impl Channel for MockDevice {
    fn exchange(&mut self, apdu: &[u8]) -> Result<Vec<u8>> {
        self.state.borrow_mut().frames.push(apdu.to_vec());
        Ok(self.handle(apdu))
    }

    fn close(&mut self) -> Result<()> {
        self.state.borrow_mut().closed += 1;
        Ok(())
    }
}

fn split_path(payload: &[u8]) -> Option<(DerivationPath, &[u8])> {
    let count = usize::from(*payload.first()?);
    let end = 1 + count * 4;
    let path = DerivationPath::decode(payload.get(1..end)?).ok()?;
    Some((path, &payload[end..]))
}

/// Whether `body` holds a whole (optionally typed) RLP list.
fn transaction_complete(body: &[u8]) -> bool {
    let list = match body.first() {
        Some(0x01 | 0x02) => &body[1..],
        _ => body,
    };
    let Some(&prefix) = list.first() else {
        return false;
    };

    let total = match prefix {
        0xc0..=0xf7 => 1 + usize::from(prefix - 0xc0),
        0xf8..=0xff => {
            let len_of_len = usize::from(prefix - 0xf7);
            let Some(len_bytes) = list.get(1..1 + len_of_len) else {
                return false;
            };
            let len = len_bytes
                .iter()
                .fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
            1 + len_of_len + len
        }
        _ => return false,
    };

    list.len() >= total
}

fn message_complete(body: &[u8]) -> bool {
    let Some(len) = body.get(..4) else {
        return false;
    };
    let len = u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize;
    body.len() >= 4 + len
}

pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    Address::from_slice(&keccak256(&point.as_bytes()[1..])[12..])
}

/// Recovers the signer of `hash` from a signature, whatever form its `v` has.
pub fn recover(hash: B256, signature: &Signature) -> Address {
    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(&signature.r.to_be_bytes::<32>());
    rs[32..].copy_from_slice(&signature.s.to_be_bytes::<32>());

    let ecdsa = EcdsaSignature::from_slice(&rs).expect("valid r and s");
    let parity = signature.parity().expect("v encodes a parity");
    let recovery = RecoveryId::from_byte(parity).expect("parity is 0 or 1");
    let key = VerifyingKey::recover_from_prehash(hash.as_slice(), &ecdsa, recovery)
        .expect("recoverable signature");
    address_of(&key)
}
