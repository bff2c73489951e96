//! quotient: client engine for asynchronous vendor-quote analysis.
//!
//! Upload a quote document, poll the backend until processing reaches a
//! terminal state, reconcile every snapshot into a shared ordered
//! collection, and normalize the completed record into derived savings
//! and risk figures.

mod analysis;
mod client;
mod credentials;
mod poller;
mod quote;
mod registry;
mod service;
mod store;

pub mod protocol;

pub use analysis::{QuoteStats, analyze};
pub use client::{ApiClient, ApiConfig, ApiError, QUOTIENT_VERSION, QuoteApi};
pub use credentials::{CredentialProvider, MemoryCredentials, StaticCredentials};
pub use poller::PollConfig;
pub use quote::{
    AffiliateLink, AnalysisSummary, CatalogProduct, CompetitiveRisk, Financials, LineItem,
    MatchMethod, OfferType, ProductMatch, ProductOffer, QuoteAnalysis, QuoteStatus, VendorInfo,
};
pub use registry::PollRegistry;
pub use service::QuoteService;
pub use store::QuoteStore;
pub use tokio_util::sync::CancellationToken;
