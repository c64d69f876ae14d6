/// Re-export `Config` from `whoami-core` for use within this crate.
///
/// Environment parsing lives in `whoami-core` so integration tests can build
/// a `Config` without depending on the binary.
pub use whoami_core::config::Config;
