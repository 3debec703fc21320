//! AdGuard Lite Core Library
//!
//! This crate provides the cosmetic filtering and popup suppression engine for
//! the AdGuard Lite content blocker. It does no I/O of its own: the page is
//! reached through the [`dom`] host traits, timers through [`scheduler`], and
//! the policy authority through plain request/reply values the host carries.
//!
//! # Architecture
//!
//! Each page load gets one [`PageSession`]. The session selects a
//! [`SiteProfile`] for the hostname, builds its selector catalog, and gates
//! everything on the authority's answer. Once active it sweeps the document,
//! re-sweeps on debounced mutations, runs a low-frequency sanitizer, and arms
//! the popup guard.
//!
//! # Modules
//!
//! - `dom`: Host traits plus an in-memory DOM (selectors via `scraper`) for
//!   tests and tooling
//! - `classifier`: Ad heuristics for a single element
//! - `catalog`: Static selector catalog, partitioned into sections
//! - `profile`: Per-site profiles and hostname matching
//! - `sweep`: One pass of the catalog over the document
//! - `overlay`: Full-viewport overlay removal
//! - `guard`: Popup/navigation guard decisions
//! - `observer`: Debounced reaction to mutations
//! - `sanitizer`: Periodic cleanup pass
//! - `policy`: Enabled/allow-listed gate
//! - `protocol`: Runtime message types
//! - `authority`: In-process reference authority
//! - `session`: Per-page session context
//! - `types`: Shared type definitions

pub mod authority;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod dom;
pub mod error;
pub mod guard;
pub mod observer;
pub mod overlay;
pub mod policy;
pub mod profile;
pub mod protocol;
pub mod sanitizer;
pub mod scheduler;
pub mod session;
pub mod sweep;
pub mod types;

// Re-export commonly used types
pub use authority::MemoryAuthority;
pub use catalog::{CatalogSection, SelectorCatalog};
pub use classifier::{classify, Classifier};
pub use config::{EngineConfig, FailMode, GuardGating};
pub use dom::{Document, Element};
pub use error::{AuthorityError, ConfigError, DomError, ProtocolError};
pub use guard::{ClickVerdict, OpenVerdict, PageInterceptor, PopupGuard, UnloadVerdict};
pub use observer::MutationBatch;
pub use policy::{PolicyCheck, SitePolicyState};
pub use profile::SiteProfile;
pub use protocol::{AuthorityRequest, PageMessage};
pub use scheduler::Scheduler;
pub use session::{PageAction, PageSession, Phase, TimerOutcome};
pub use types::{Aggressiveness, GuardFeatures, TimerId, TimerKind};
