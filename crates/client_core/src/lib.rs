pub mod config;
pub mod decode;
pub mod discovery;
pub mod location;
pub mod session;

pub use discovery::{DirectoryEvent, DirectorySnapshot, PollDirectory};
pub use location::{InMemoryLocation, LocationMirror, NoopLocationMirror};
pub use session::{PollSession, ReadPhase, SessionEvent, SessionSnapshot, WritePhase};
