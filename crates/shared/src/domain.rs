use serde::{Deserialize, Serialize};

macro_rules! string_id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id_newtype!(PollId);
string_id_newtype!(TxHash);
string_id_newtype!(Address);

impl Address {
    /// Account identities compare case-insensitively on this ledger.
    pub fn matches(&self, other: &Address) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

/// Contract deployment the process is bound to. Read-only configuration;
/// never mutated by the core services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub package_id: String,
    pub module: String,
}

impl Deployment {
    pub fn new(package_id: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            package_id: package_id.into(),
            module: module.into(),
        }
    }

    /// Fully qualified entry-point target, `{package}::{module}::{entry}`.
    pub fn target(&self, entry: &str) -> String {
        format!("{}::{}::{}", self.package_id, self.module, entry)
    }

    /// Fully qualified event type emitted by this deployment.
    pub fn event_type(&self, event: &str) -> String {
        format!("{}::{}::{}", self.package_id, self.module, event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    Yes,
    No,
}

impl VoteChoice {
    /// Wire discriminant the contract's `vote` entry point expects.
    pub fn discriminant(self) -> u8 {
        match self {
            VoteChoice::Yes => 0,
            VoteChoice::No => 1,
        }
    }
}

/// Decoded snapshot of one poll's on-chain state. Produced fresh on every
/// successful fetch and replaced wholesale, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollRecord {
    pub creator: Address,
    pub title: String,
    pub description: String,
    pub yes_count: u64,
    pub no_count: u64,
    pub total_votes: u64,
}

impl PollRecord {
    /// `total_votes == yes_count + no_count` is a contract invariant; this
    /// layer surfaces violations rather than correcting them.
    pub fn tally_consistent(&self) -> bool {
        self.total_votes == self.yes_count + self.no_count
    }
}

/// Summary of a poll as announced by its creation event. Title and
/// description are creation-time values and never updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollListEntry {
    pub poll_id: PollId,
    pub creator: Address,
    pub title: String,
    pub description: String,
}
