//! `ianatz` parses the IANA time zone database and answers two
//! questions about a zone: what offset is in effect at a UTC instant,
//! and what offset(s) a wall-clock reading could mean.
//!
//! It decodes TZif binary files ([RFC 8536][rfc8536]), evaluates the
//! POSIX `TZ` tail rule that TZif v2+ files append for instants past
//! their last recorded transition, and reconciles the two into a
//! lookup engine that disambiguates the gaps and overlaps daylight
//! saving transitions create.
//!
//! Loading a zone by key goes through [`Zone::new`], which consults a
//! process-wide cache before falling back to the filesystem collaborator
//! rooted at `$TZDIR` (or `/usr/share/zoneinfo`). Call [`Zone::from_bytes`]
//! to build a zone directly from TZif bytes without touching any search
//! path or cache, which is how the test suite and non-POSIX embedders use
//! this crate.
//!
//! [rfc8536]: https://datatracker.ietf.org/doc/html/rfc8536
#![cfg_attr(not(test), forbid(clippy::unwrap_used))]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]

pub mod error;
pub mod time;

pub(crate) mod builder;
pub(crate) mod cache;
pub(crate) mod lookup;
pub(crate) mod posix;
pub(crate) mod source;
pub(crate) mod tzif;
pub(crate) mod utils;

mod zone;

pub use builder::TypeRecord;
pub use cache::DEFAULT_STRONG_CACHE_CAPACITY;
pub use error::{ErrorKind, TzError, TzResult};
pub use posix::TailRule;
pub use source::{FsZoneSource, ZoneSource};
pub use time::{Instant, LocalDateTime};
pub use zone::{TimeZone, Zone};
