//! # Core Entities
//!
//! Identifiers, addresses and the few records that both nodes of a channel
//! must agree on byte for byte.
//!
//! ## Clusters
//!
//! - **Identity**: `Address` (ledger account), `PeerAddress` (network endpoint)
//! - **Identifiers**: `ProposalId`, `ChannelId`, `PaymentId`, `MessageId`
//! - **Channel state**: `ChannelState`, `PaymentRecord`, `StateSignature`
//! - **Time**: `Timestamp`, `TimeSource`

use crate::amount::{decimal, Amount};
use crate::errors::TypesError;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// A 20-byte ledger account address.
///
/// Parsing is case-insensitive, so two spellings of the same account compare
/// equal once parsed. Rendered as lowercase `0x`-prefixed hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if hex_part.len() != 40 {
            return Err(TypesError::InvalidAddress(s.to_string()));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(hex_part, &mut bytes)
            .map_err(|_| TypesError::InvalidAddress(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// Network address of a node (`http://host:port`, or `mem://name` in tests).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerAddress(String);

impl PeerAddress {
    /// Parse and normalise a peer address (trailing `/` removed).
    pub fn parse(raw: &str) -> Result<Self, TypesError> {
        let trimmed = raw.trim().trim_end_matches('/');
        let valid = trimmed
            .split_once("://")
            .map(|(scheme, rest)| !scheme.is_empty() && !rest.is_empty())
            .unwrap_or(false);
        if !valid || trimmed.chars().any(char::is_whitespace) {
            return Err(TypesError::InvalidAddress(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The normalised address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PeerAddress {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PeerAddress> for String {
    fn from(value: PeerAddress) -> Self {
        value.0
    }
}

impl FromStr for PeerAddress {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerAddress({})", self.0)
    }
}

// =============================================================================
// CLUSTER B: IDENTIFIERS
// =============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// The inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = TypesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| TypesError::InvalidIdentifier(s.to_string()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a channel proposal.
    ProposalId
);
uuid_id!(
    /// Identifier of a channel, shared by both participants.
    ChannelId
);
uuid_id!(
    /// Identifier of a single off-chain payment record.
    PaymentId
);
uuid_id!(
    /// Identifier of a wire message, used for duplicate suppression.
    MessageId
);

// =============================================================================
// CLUSTER C: CHANNEL STATE
// =============================================================================

/// Channel lifecycle state. Only ever moves forward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelState {
    /// Deployed, waiting for both deposits.
    #[default]
    Empty,
    /// Both deposits confirmed on the ledger; payments allowed.
    Active,
    /// Close submitted; challenge window running.
    Closing,
    /// Funds withdrawn. Terminal.
    Closed,
}

impl ChannelState {
    /// Map the settlement contract's ordinal to a state.
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Empty),
            1 => Some(Self::Active),
            2 => Some(Self::Closing),
            3 => Some(Self::Closed),
            _ => None,
        }
    }

    /// The settlement contract's ordinal for this state.
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::Empty => 0,
            Self::Active => 1,
            Self::Closing => 2,
            Self::Closed => 3,
        }
    }

    /// Single-step transition allowed to a local operation.
    pub fn can_transition_to(&self, next: ChannelState) -> bool {
        matches!(
            (self, next),
            (Self::Empty, Self::Active) | (Self::Active, Self::Closing) | (Self::Closing, Self::Closed)
        )
    }

    /// Whether `other` lies strictly after `self` in the lifecycle.
    pub fn is_behind(&self, other: ChannelState) -> bool {
        self.ordinal() < other.ordinal()
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Empty => "EMPTY",
            Self::Active => "ACTIVE",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// 65-byte recoverable secp256k1 signature (`r || s || v`).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct StateSignature(pub [u8; 65]);

impl StateSignature {
    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }
}

impl fmt::Debug for StateSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateSignature(0x{}..)", hex::encode(&self.0[..4]))
    }
}

impl Serialize for StateSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
    }
}

impl<'de> Deserialize<'de> for StateSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let body = raw.strip_prefix("0x").unwrap_or(&raw);
        let mut bytes = [0u8; 65];
        hex::decode_to_slice(body, &mut bytes)
            .map_err(|_| D::Error::custom(TypesError::InvalidSignature(raw.clone())))?;
        Ok(Self(bytes))
    }
}

/// Where a payment record came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentOrigin {
    /// Created and signed by this node.
    Local,
    /// Received from the counterparty.
    #[default]
    Remote,
}

/// One applied off-chain balance update. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    /// Record identifier.
    pub id: PaymentId,
    /// Channel sequence number this record establishes.
    pub nonce: u64,
    /// Participant A's balance after the payment.
    #[serde(with = "decimal")]
    pub balance_a: Amount,
    /// Participant B's balance after the payment.
    #[serde(with = "decimal")]
    pub balance_b: Amount,
    /// Transferred amount.
    #[serde(with = "decimal")]
    pub amount: Amount,
    /// Paying participant.
    pub sender: Address,
    /// Receiving participant.
    pub recipient: Address,
    /// Sender's signature over `(nonce, balance_a, balance_b)`.
    pub signature: StateSignature,
    /// Creation time.
    pub timestamp: Timestamp,
    /// Provenance. Not sent on the wire; anything decoded is `Remote`.
    #[serde(skip)]
    pub origin: PaymentOrigin,
}

// =============================================================================
// CLUSTER D: TIME
// =============================================================================

/// Unix timestamp in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Create from milliseconds since the epoch.
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Milliseconds since the epoch.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub fn saturating_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Abstract clock, injected so time-dependent logic is testable.
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Timestamp(ms)
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    time: AtomicU64,
}

impl ManualTimeSource {
    /// Start the clock at `initial_ms`.
    pub fn new(initial_ms: u64) -> Self {
        Self {
            time: AtomicU64::new(initial_ms),
        }
    }

    /// Advance by `ms` milliseconds.
    pub fn advance(&self, ms: u64) {
        self.time.fetch_add(ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp(self.time.load(Ordering::SeqCst))
    }
}
