//! Wire protocol for the storefront backend.
//!
//! Uploads go through a REST multipart endpoint; status, detail and
//! listing queries go through the GraphQL endpoint. Records here mirror
//! the backend's response shapes exactly; the analyzer maps them into
//! the crate's own types.

use serde::Deserialize;

use crate::quote::{MatchMethod, OfferType, QuoteStatus};

/// Lightweight status query, issued on every poll tick.
pub const QUOTE_STATUS: &str = r#"
query QuoteStatus($id: ID!) {
  quote(id: $id) {
    id
    status
    vendorName
    vendorCompany
    quoteNumber
    quoteDate
    subtotal
    tax
    shipping
    total
    itemCount
    matchedItemCount
    estimatedTimeRemaining
    createdAt
    updatedAt
    processedAt
    parsingError
  }
}
"#;

/// Full detail query, issued once a quote reaches `completed`.
pub const QUOTE_ANALYSIS: &str = r#"
query QuoteAnalysis($id: ID!) {
  quote(id: $id) {
    id
    status
    vendorName
    vendorCompany
    quoteNumber
    quoteDate
    subtotal
    tax
    shipping
    total
    originalFilename
    parsingError
    items {
      id
      lineNumber
      partNumber
      description
      manufacturer
      quantity
      unitPrice
      totalPrice
      vendorSku
      extractionConfidence
      matches {
        id
        confidence
        priceDifference
        isExactMatch
        matchMethod
        isDemoPrice
        product {
          id
          name
          description
          manufacturer {
            name
          }
          categories {
            name
          }
          offers {
            id
            sellingPrice
            offerType
            isConfirmed
            sourceQuote {
              id
              quoteNumber
            }
            vendor {
              name
              code
            }
          }
          affiliateLinks {
            id
            platform
            affiliateUrl
            commissionRate
            isActive
          }
        }
      }
    }
  }
}
"#;

/// Listing query for the caller's submitted quotes.
pub const MY_QUOTES: &str = r#"
query MyQuotes {
  myQuotes {
    id
    vendorCompany
    quoteNumber
    total
    status
    itemCount
    matchedItemCount
    createdAt
  }
}
"#;

pub(crate) mod money {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    /// Backend decimals arrive as JSON numbers or strings depending on
    /// which serializer sat in front of them.
    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Number(n)) => Ok(Some(n)),
            Some(Raw::Text(s)) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(None);
                }
                s.parse::<f64>().map(Some).map_err(|_| {
                    serde::de::Error::custom(format!("invalid decimal: {s:?}"))
                })
            }
        }
    }
}

/// GraphQL response envelope.
#[derive(Debug, Deserialize)]
pub struct GraphQlEnvelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuoteData {
    pub quote: Option<QuoteRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuoteDetailData {
    pub quote: Option<QuoteDetailRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MyQuotesData {
    #[serde(default)]
    pub my_quotes: Vec<QuoteRecord>,
}

/// Upload endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub quote: Option<SubmittedQuote>,
    #[serde(default)]
    pub errors: Option<Vec<String>>,
}

/// Job handle returned by a successful upload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedQuote {
    pub id: String,
    pub status: QuoteStatus,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Error body the upload endpoint returns on non-2xx.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct UploadErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Partial snapshot from the status query. Every field except `id` and
/// `status` may be null until processing finishes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRecord {
    pub id: String,
    pub status: QuoteStatus,
    #[serde(default)]
    pub vendor_name: Option<String>,
    #[serde(default)]
    pub vendor_company: Option<String>,
    #[serde(default)]
    pub quote_number: Option<String>,
    #[serde(default)]
    pub quote_date: Option<String>,
    #[serde(default, deserialize_with = "money::deserialize")]
    pub subtotal: Option<f64>,
    #[serde(default, deserialize_with = "money::deserialize")]
    pub tax: Option<f64>,
    #[serde(default, deserialize_with = "money::deserialize")]
    pub shipping: Option<f64>,
    #[serde(default, deserialize_with = "money::deserialize")]
    pub total: Option<f64>,
    #[serde(default)]
    pub item_count: Option<u32>,
    #[serde(default)]
    pub matched_item_count: Option<u32>,
    #[serde(default)]
    pub estimated_time_remaining: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub processed_at: Option<String>,
    #[serde(default)]
    pub parsing_error: Option<String>,
}

/// Full record from the detail query: status fields plus parsed items
/// with their match candidates.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteDetailRecord {
    pub id: String,
    pub status: QuoteStatus,
    #[serde(default)]
    pub vendor_name: Option<String>,
    #[serde(default)]
    pub vendor_company: Option<String>,
    #[serde(default)]
    pub quote_number: Option<String>,
    #[serde(default)]
    pub quote_date: Option<String>,
    #[serde(default, deserialize_with = "money::deserialize")]
    pub subtotal: Option<f64>,
    #[serde(default, deserialize_with = "money::deserialize")]
    pub tax: Option<f64>,
    #[serde(default, deserialize_with = "money::deserialize")]
    pub shipping: Option<f64>,
    #[serde(default, deserialize_with = "money::deserialize")]
    pub total: Option<f64>,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub parsing_error: Option<String>,
    #[serde(default)]
    pub item_count: Option<u32>,
    #[serde(default)]
    pub matched_item_count: Option<u32>,
    #[serde(default)]
    pub estimated_time_remaining: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub processed_at: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    pub id: String,
    #[serde(default)]
    pub line_number: Option<u32>,
    #[serde(default)]
    pub part_number: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default, deserialize_with = "money::deserialize")]
    pub unit_price: Option<f64>,
    #[serde(default, deserialize_with = "money::deserialize")]
    pub total_price: Option<f64>,
    #[serde(default)]
    pub vendor_sku: Option<String>,
    #[serde(default)]
    pub extraction_confidence: Option<f64>,
    #[serde(default)]
    pub matches: Vec<MatchRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub id: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "money::deserialize")]
    pub price_difference: Option<f64>,
    #[serde(default)]
    pub is_exact_match: bool,
    #[serde(default)]
    pub match_method: Option<MatchMethod>,
    #[serde(default)]
    pub is_demo_price: bool,
    #[serde(default)]
    pub product: Option<ProductRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<NameRecord>,
    #[serde(default)]
    pub categories: Vec<NameRecord>,
    #[serde(default)]
    pub offers: Vec<OfferRecord>,
    #[serde(default)]
    pub affiliate_links: Vec<AffiliateLinkRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NameRecord {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferRecord {
    pub id: String,
    #[serde(default, deserialize_with = "money::deserialize")]
    pub selling_price: Option<f64>,
    #[serde(default)]
    pub offer_type: Option<OfferType>,
    #[serde(default)]
    pub is_confirmed: bool,
    #[serde(default)]
    pub source_quote: Option<SourceQuoteRecord>,
    #[serde(default)]
    pub vendor: Option<VendorRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceQuoteRecord {
    pub id: String,
    #[serde(default)]
    pub quote_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VendorRecord {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateLinkRecord {
    pub id: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub affiliate_url: Option<String>,
    #[serde(default, deserialize_with = "money::deserialize")]
    pub commission_rate: Option<f64>,
    #[serde(default)]
    pub is_active: bool,
}
