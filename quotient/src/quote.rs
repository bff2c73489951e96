//! Quote analysis state tracking.

use serde::{Deserialize, Serialize};

use crate::protocol::{QuoteRecord, SubmittedQuote};

/// Processing status reported by the backend for a submitted quote.
///
/// Statuses only move forward through
/// `uploading → parsing → matching → {completed | error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStatus {
    Uploading,
    Parsing,
    Matching,
    Completed,
    Error,
}

impl QuoteStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Parsing => "parsing",
            Self::Matching => "matching",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Case-insensitive parse. The backend emits mixed case depending on
    /// which serializer produced the payload.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "uploading" => Some(Self::Uploading),
            "parsing" => Some(Self::Parsing),
            "matching" => Some(Self::Matching),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Position in the forward-only status sequence. `Error` sorts with
    /// `Completed` since both are terminal jumps.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Uploading => 0,
            Self::Parsing => 1,
            Self::Matching => 2,
            Self::Completed | Self::Error => 3,
        }
    }
}

impl Serialize for QuoteStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for QuoteStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).ok_or_else(|| {
            serde::de::Error::unknown_variant(
                &s,
                &["uploading", "parsing", "matching", "completed", "error"],
            )
        })
    }
}

/// How a catalog product was matched against a quoted line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    ExactPartNumber,
    FuzzyMatch,
    ManufacturerMatch,
    DescriptionSimilarity,
    DemoGenerated,
}

/// Competitive exposure of a quoted line.
///
/// The classifier only ever emits `Low` (some match found) or `High`
/// (no match); `Medium` stays in the type for backends that grade it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompetitiveRisk {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferType {
    Supplier,
    Affiliate,
    Quote,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateLink {
    pub id: String,
    pub platform: Option<String>,
    pub affiliate_url: Option<String>,
    pub commission_rate: Option<f64>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOffer {
    pub id: String,
    pub selling_price: Option<f64>,
    pub offer_type: Option<OfferType>,
    pub is_confirmed: bool,
    pub vendor_name: Option<String>,
    pub vendor_code: Option<String>,
    pub source_quote_number: Option<String>,
}

/// Catalog product embedded in a match candidate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProduct {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub manufacturer: Option<String>,
    pub categories: Vec<String>,
    pub offers: Vec<ProductOffer>,
    pub affiliate_links: Vec<AffiliateLink>,
}

impl CatalogProduct {
    pub fn has_active_affiliate_link(&self) -> bool {
        self.affiliate_links.iter().any(|link| link.is_active)
    }
}

/// Candidate catalog product proposed against a line item.
///
/// Owned by exactly one `LineItem`; the backend orders candidates
/// best-first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductMatch {
    pub id: String,
    pub confidence: f64,
    /// Delta versus the quoted line price. Negative means the candidate
    /// is cheaper than the quote.
    pub price_difference: f64,
    pub is_exact_match: bool,
    pub match_method: Option<MatchMethod>,
    /// The comparison price is synthetic demo data, not a live offer.
    pub is_demo_price: bool,
    pub product: Option<CatalogProduct>,
}

/// One parsed line from the submitted document, with derived savings
/// fields filled in by the analyzer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: String,
    pub line_number: Option<u32>,
    pub part_number: String,
    pub description: String,
    pub manufacturer: Option<String>,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_price: f64,
    pub vendor_sku: Option<String>,
    pub extraction_confidence: f64,
    pub matches: Vec<ProductMatch>,
    pub best_alternative: Option<ProductMatch>,
    pub potential_savings: f64,
    pub savings_percentage: f64,
    pub has_affiliate_option: bool,
    pub competitive_risk: CompetitiveRisk,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorInfo {
    pub name: Option<String>,
    pub company: Option<String>,
    pub quote_number: Option<String>,
    pub quote_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Financials {
    pub subtotal: Option<f64>,
    pub tax: Option<f64>,
    pub shipping: Option<f64>,
    pub total: Option<f64>,
}

/// Aggregate view over one analysis. Computed, never mutated directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub total_items: u32,
    pub matched_items: u32,
    pub potential_savings: f64,
    pub savings_percentage: f64,
    pub affiliate_opportunities: u32,
}

/// One submitted analysis request.
///
/// Created by the upload operation, updated in place by id on every poll
/// tick, replaced wholesale once the terminal analysis lands. Lives in
/// the shared collection until explicitly cleared.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteAnalysis {
    pub id: String,
    pub status: QuoteStatus,
    pub vendor: VendorInfo,
    pub financials: Financials,
    pub items: Vec<LineItem>,
    pub summary: AnalysisSummary,
    pub original_filename: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub processed_at: Option<String>,
    pub parsing_error: Option<String>,
    /// Backend estimate in seconds, only meaningful mid-processing.
    pub estimated_time_remaining: Option<f64>,
    pub item_count: Option<u32>,
    pub matched_item_count: Option<u32>,
}

impl QuoteAnalysis {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Seed an entry from the upload response, before the first poll tick.
    pub fn from_submission(submitted: SubmittedQuote) -> Self {
        let created_at = submitted
            .created_at
            .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
        Self {
            id: submitted.id,
            status: submitted.status,
            vendor: VendorInfo::default(),
            financials: Financials::default(),
            items: Vec::new(),
            summary: AnalysisSummary::default(),
            original_filename: submitted.original_filename,
            created_at: created_at.clone(),
            updated_at: created_at,
            processed_at: None,
            parsing_error: None,
            estimated_time_remaining: None,
            item_count: None,
            matched_item_count: None,
        }
    }

    /// Seed an entry from a listing row. Items and summary stay empty
    /// until the detail fetch runs.
    pub fn from_record(record: &QuoteRecord) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: record.id.clone(),
            status: record.status,
            vendor: VendorInfo {
                name: record.vendor_name.clone(),
                company: record.vendor_company.clone(),
                quote_number: record.quote_number.clone(),
                quote_date: record.quote_date.clone(),
            },
            financials: Financials {
                subtotal: record.subtotal,
                tax: record.tax,
                shipping: record.shipping,
                total: record.total,
            },
            items: Vec::new(),
            summary: AnalysisSummary::default(),
            original_filename: None,
            created_at: record.created_at.clone().unwrap_or_else(|| now.clone()),
            updated_at: record.updated_at.clone().unwrap_or(now),
            processed_at: record.processed_at.clone(),
            parsing_error: record.parsing_error.clone(),
            estimated_time_remaining: record.estimated_time_remaining,
            item_count: record.item_count,
            matched_item_count: record.matched_item_count,
        }
    }
}
