//! Relay between the BattlEye RCon stream and Discord.
//!
//! ## Module Structure
//!
//! - `classifier`: raw line to event classification
//! - `filter`: configurable line suppression
//! - `router`: event to logical channel and rendering
//! - `population`: status channel label tracking
//! - `orchestrator`: drives the above for every RCon event
//! - `state`: channel bindings resolved from Discord
//! - `channels`: communication channel structures

pub mod channels;
pub mod classifier;
pub mod filter;
pub mod orchestrator;
pub mod population;
pub mod router;
pub mod state;

pub use channels::ChannelBundle;
pub use classifier::LineClassifier;
pub use filter::LineFilter;
pub use orchestrator::RelayOrchestrator;
