// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Shardwallet — Partition Wallet Library
//!
//! Client-side wallet for a platform split into independent partitions, each
//! reachable over RPC. The wallet builds transactions, proves ownership,
//! sends them and learns by polling whether each one made it into the ledger
//! before its timeout round. It never looks at consensus state; inclusion
//! proofs from the configured endpoint are the only evidence it uses.
//!
//! ## Architecture
//!
//! - **crypto** — Ed25519 account keys and SHA-256 hashing.
//! - **types** — Unit ids, value units, fee-credit records.
//! - **predicate** — Owner predicates and the proofs that satisfy them.
//! - **transaction** — Orders, attributes, signing, inclusion proofs.
//! - **rpc** — The partition client interface, JSON-RPC and in-memory backends.
//! - **round** — Round-number caching for multi-transaction preparation.
//! - **txsubmitter** — Send-and-confirm batches.
//! - **fees** — Fee-credit precondition.
//! - **accounts** — Account key lookup.
//! - **dust** — Consolidation of small same-type units.
//! - **wallet** — The operations the CLI exposes.
//! - **config** — Protocol constants and wallet settings.
//!
//! ## Pipeline
//!
//! Every state change funnels through the same steps: ensure fee credit,
//! build the order, attach proofs, submit, poll for confirmation. Dust
//! collection is a sequence of such batches per chunk: lock, burn, join.

pub mod accounts;
pub mod config;
pub mod crypto;
pub mod dust;
pub mod fees;
pub mod predicate;
pub mod round;
pub mod rpc;
pub mod transaction;
pub mod txsubmitter;
pub mod types;
pub mod wallet;

pub use wallet::{SendRequest, Wallet, WalletError};
