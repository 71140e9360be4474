//! Core library for the Leadex lead-distribution service.
//!
//! Inbound leads are written once, fanned out to every available agent, and
//! awarded to exactly one claimant. All mutual exclusion is delegated to the
//! lead store's conditional transition primitive; see [`store::ports::LeadRepository`].

pub mod config;
pub mod directory;
pub mod error;
pub mod fanout;
pub mod intake;
pub mod resolver;
pub mod store;
pub mod sweeper;

pub use config::{ClaimConfig, DistributionConfig, LoserNotificationPolicy, NotifyConfig};
pub use directory::AgentDirectoryService;
pub use error::{LeadError, Result};
pub use fanout::{
    ClaimInvitation, FanoutNotifier, HttpMessenger, LogMessenger, Messenger, OutboundMessage,
};
pub use intake::{IncomingLead, IntakeReceipt, LeadIntakeService};
pub use resolver::{ClaimRequest, ClaimResolution, ClaimResolver};
pub use sweeper::{EscalationSink, ExpirySweeper, HttpEscalationSink};
