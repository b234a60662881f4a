//! URL handling module for Sumi-Harvest
//!
//! This module turns raw `href` values into canonical [`NormalizedUrl`]s and
//! decides which of them belong to the crawl. It is the only place where the
//! host allow-list and the repeated-segment rule are applied.

mod hosts;
mod normalize;

pub use hosts::AllowedHosts;
pub use normalize::{has_repeated_segment, normalize, NormalizedUrl};
