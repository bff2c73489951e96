//! Normalization of completed quote records.
//!
//! Maps the backend's detail record into `QuoteAnalysis`: derived savings
//! per line, a binary risk grade, and the aggregate summary. The mapping
//! is pure; running it twice over the same record yields the same output
//! (timestamps are only stamped when the backend omitted them).

use crate::protocol::{ItemRecord, MatchRecord, ProductRecord, QuoteDetailRecord};
use crate::quote::{
    AffiliateLink, AnalysisSummary, CatalogProduct, CompetitiveRisk, Financials, LineItem,
    ProductMatch, ProductOffer, QuoteAnalysis, VendorInfo,
};

/// Produce the normalized analysis for a completed quote.
pub fn analyze(record: QuoteDetailRecord) -> QuoteAnalysis {
    let items: Vec<LineItem> = record.items.into_iter().map(analyze_item).collect();

    let local_total = items.len() as u32;
    let local_matched = items.iter().filter(|i| !i.matches.is_empty()).count() as u32;

    let potential_savings: f64 = items
        .iter()
        .map(|item| {
            item.best_alternative
                .as_ref()
                .map(|m| m.price_difference.abs())
                .unwrap_or(0.0)
        })
        .sum();

    let savings_percentage = match record.total {
        Some(total) if total != 0.0 => potential_savings / total * 100.0,
        _ => 0.0,
    };

    let summary = AnalysisSummary {
        total_items: record.item_count.unwrap_or(local_total),
        matched_items: record.matched_item_count.unwrap_or(local_matched),
        potential_savings,
        savings_percentage,
        affiliate_opportunities: items.iter().filter(|i| i.has_affiliate_option).count() as u32,
    };

    // Last-resort fallback; not reliable for auditing.
    let now = chrono::Utc::now().to_rfc3339();

    QuoteAnalysis {
        id: record.id,
        status: record.status,
        vendor: VendorInfo {
            name: record.vendor_name,
            company: record.vendor_company,
            quote_number: record.quote_number,
            quote_date: record.quote_date,
        },
        financials: Financials {
            subtotal: record.subtotal,
            tax: record.tax,
            shipping: record.shipping,
            total: record.total,
        },
        items,
        summary,
        original_filename: record.original_filename,
        created_at: record.created_at.unwrap_or_else(|| now.clone()),
        updated_at: record.updated_at.unwrap_or_else(|| now.clone()),
        processed_at: record.processed_at.or(Some(now)),
        parsing_error: record.parsing_error,
        estimated_time_remaining: record.estimated_time_remaining,
        item_count: record.item_count,
        matched_item_count: record.matched_item_count,
    }
}

fn analyze_item(record: ItemRecord) -> LineItem {
    let matches: Vec<ProductMatch> = record.matches.into_iter().map(convert_match).collect();
    let total_price = record.total_price.unwrap_or(0.0);

    let best_alternative = matches.first().cloned();
    let potential_savings = best_alternative
        .as_ref()
        .map(|m| m.price_difference.abs())
        .unwrap_or(0.0);
    // Guarded against an absent or zero line total so a malformed line
    // cannot push a non-finite float into serialized output.
    let savings_percentage = if best_alternative.is_some() && total_price != 0.0 {
        potential_savings / total_price * 100.0
    } else {
        0.0
    };
    let has_affiliate_option = matches.iter().any(|m| {
        m.product
            .as_ref()
            .is_some_and(CatalogProduct::has_active_affiliate_link)
    });
    // Binary grade: any candidate at all counts as covered. Medium is
    // never produced here.
    let competitive_risk = if matches.is_empty() {
        CompetitiveRisk::High
    } else {
        CompetitiveRisk::Low
    };

    LineItem {
        id: record.id,
        line_number: record.line_number,
        part_number: record.part_number.unwrap_or_default(),
        description: record.description.unwrap_or_default(),
        manufacturer: record.manufacturer,
        quantity: record.quantity.unwrap_or(0.0),
        unit_price: record.unit_price.unwrap_or(0.0),
        total_price,
        vendor_sku: record.vendor_sku,
        extraction_confidence: record.extraction_confidence.unwrap_or(0.0),
        matches,
        best_alternative,
        potential_savings,
        savings_percentage,
        has_affiliate_option,
        competitive_risk,
    }
}

fn convert_match(record: MatchRecord) -> ProductMatch {
    ProductMatch {
        id: record.id,
        confidence: record.confidence.unwrap_or(0.0),
        price_difference: record.price_difference.unwrap_or(0.0),
        is_exact_match: record.is_exact_match,
        match_method: record.match_method,
        is_demo_price: record.is_demo_price,
        product: record.product.map(convert_product),
    }
}

fn convert_product(record: ProductRecord) -> CatalogProduct {
    CatalogProduct {
        id: record.id,
        name: record.name,
        description: record.description,
        manufacturer: record.manufacturer.map(|m| m.name),
        categories: record.categories.into_iter().map(|c| c.name).collect(),
        offers: record
            .offers
            .into_iter()
            .map(|offer| ProductOffer {
                id: offer.id,
                selling_price: offer.selling_price,
                offer_type: offer.offer_type,
                is_confirmed: offer.is_confirmed,
                vendor_name: offer.vendor.as_ref().map(|v| v.name.clone()),
                vendor_code: offer.vendor.and_then(|v| v.code),
                source_quote_number: offer.source_quote.and_then(|q| q.quote_number),
            })
            .collect(),
        affiliate_links: record
            .affiliate_links
            .into_iter()
            .map(|link| AffiliateLink {
                id: link.id,
                platform: link.platform,
                affiliate_url: link.affiliate_url,
                commission_rate: link.commission_rate,
                is_active: link.is_active,
            })
            .collect(),
    }
}

/// Derived snapshot over one analysis, recomputed on demand.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteStats {
    pub total_items: u32,
    pub matched_items: u32,
    pub match_rate: f64,
    pub potential_savings: f64,
    pub affiliate_opportunities: u32,
}

impl QuoteStats {
    pub fn for_analysis(analysis: &QuoteAnalysis) -> Self {
        let total_items = analysis.items.len() as u32;
        let matched_items = analysis
            .items
            .iter()
            .filter(|i| !i.matches.is_empty())
            .count() as u32;
        let match_rate = if total_items > 0 {
            f64::from(matched_items) / f64::from(total_items) * 100.0
        } else {
            0.0
        };
        let potential_savings = analysis.items.iter().map(|i| i.potential_savings).sum();
        let affiliate_opportunities = analysis
            .items
            .iter()
            .filter(|i| i.has_affiliate_option)
            .count() as u32;

        Self {
            total_items,
            matched_items,
            match_rate,
            potential_savings,
            affiliate_opportunities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::QuoteStatus;

    fn detail(value: serde_json::Value) -> QuoteDetailRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn single_match_derives_savings_and_low_risk() {
        let analysis = analyze(detail(serde_json::json!({
            "id": "q-1",
            "status": "COMPLETED",
            "total": "100.00",
            "items": [{
                "id": "i-1",
                "partNumber": "PN-1",
                "description": "Bolt",
                "totalPrice": 100,
                "matches": [{ "id": "m-1", "priceDifference": -20 }]
            }]
        })));

        assert_eq!(analysis.status, QuoteStatus::Completed);
        let item = &analysis.items[0];
        assert_eq!(item.potential_savings, 20.0);
        assert_eq!(item.savings_percentage, 20.0);
        assert_eq!(item.competitive_risk, CompetitiveRisk::Low);
        assert_eq!(item.best_alternative.as_ref().unwrap().id, "m-1");
    }

    #[test]
    fn no_matches_derives_zeroes_and_high_risk() {
        let analysis = analyze(detail(serde_json::json!({
            "id": "q-1",
            "status": "completed",
            "total": 50,
            "items": [{
                "id": "i-1",
                "partNumber": "PN-1",
                "description": "Bolt",
                "totalPrice": 50,
                "matches": []
            }]
        })));

        let item = &analysis.items[0];
        assert_eq!(item.potential_savings, 0.0);
        assert_eq!(item.savings_percentage, 0.0);
        assert_eq!(item.competitive_risk, CompetitiveRisk::High);
        assert!(!item.has_affiliate_option);
        assert!(item.best_alternative.is_none());
        assert_eq!(analysis.summary.matched_items, 0);
    }

    #[test]
    fn summary_aggregates_best_match_deltas() {
        let analysis = analyze(detail(serde_json::json!({
            "id": "q-1",
            "status": "completed",
            "total": "200.00",
            "items": [
                {
                    "id": "i-1",
                    "partNumber": "PN-1",
                    "description": "Bolt",
                    "totalPrice": 120,
                    "matches": [
                        { "id": "m-1", "priceDifference": "-20.00" },
                        { "id": "m-2", "priceDifference": "-90.00" }
                    ]
                },
                {
                    "id": "i-2",
                    "partNumber": "PN-2",
                    "description": "Nut",
                    "totalPrice": 80,
                    "matches": [{ "id": "m-3", "priceDifference": -10 }]
                }
            ]
        })));

        // Only the first (best) candidate of each item counts.
        assert_eq!(analysis.summary.potential_savings, 30.0);
        assert_eq!(analysis.summary.savings_percentage, 15.0);
        assert_eq!(analysis.summary.total_items, 2);
        assert_eq!(analysis.summary.matched_items, 2);
    }

    #[test]
    fn summary_prefers_backend_counters() {
        let analysis = analyze(detail(serde_json::json!({
            "id": "q-1",
            "status": "completed",
            "itemCount": 40,
            "matchedItemCount": 31,
            "items": [{
                "id": "i-1",
                "partNumber": "PN-1",
                "description": "Bolt",
                "totalPrice": 10,
                "matches": []
            }]
        })));

        assert_eq!(analysis.summary.total_items, 40);
        assert_eq!(analysis.summary.matched_items, 31);
    }

    #[test]
    fn summary_savings_percentage_guards_missing_total() {
        let analysis = analyze(detail(serde_json::json!({
            "id": "q-1",
            "status": "completed",
            "items": [{
                "id": "i-1",
                "partNumber": "PN-1",
                "description": "Bolt",
                "totalPrice": 100,
                "matches": [{ "id": "m-1", "priceDifference": -20 }]
            }]
        })));

        assert_eq!(analysis.summary.potential_savings, 20.0);
        assert_eq!(analysis.summary.savings_percentage, 0.0);
    }

    #[test]
    fn affiliate_option_requires_an_active_link() {
        let analysis = analyze(detail(serde_json::json!({
            "id": "q-1",
            "status": "completed",
            "items": [
                {
                    "id": "i-1",
                    "partNumber": "PN-1",
                    "description": "Bolt",
                    "totalPrice": 10,
                    "matches": [{
                        "id": "m-1",
                        "priceDifference": -1,
                        "product": {
                            "id": "p-1",
                            "name": "Bolt",
                            "affiliateLinks": [{ "id": "a-1", "isActive": false }]
                        }
                    }]
                },
                {
                    "id": "i-2",
                    "partNumber": "PN-2",
                    "description": "Nut",
                    "totalPrice": 10,
                    "matches": [{
                        "id": "m-2",
                        "priceDifference": -1,
                        "product": {
                            "id": "p-2",
                            "name": "Nut",
                            "affiliateLinks": [{ "id": "a-2", "isActive": true }]
                        }
                    }]
                }
            ]
        })));

        assert!(!analysis.items[0].has_affiliate_option);
        assert!(analysis.items[1].has_affiliate_option);
        assert_eq!(analysis.summary.affiliate_opportunities, 1);
    }

    #[test]
    fn transform_is_idempotent_on_timestamped_records() {
        let record = detail(serde_json::json!({
            "id": "q-1",
            "status": "completed",
            "total": "200.00",
            "createdAt": "2024-03-01T10:00:00Z",
            "updatedAt": "2024-03-01T10:05:00Z",
            "processedAt": "2024-03-01T10:05:00Z",
            "items": [{
                "id": "i-1",
                "partNumber": "PN-1",
                "description": "Bolt",
                "totalPrice": 100,
                "matches": [{ "id": "m-1", "priceDifference": -20 }]
            }]
        }));

        let first = serde_json::to_string(&analyze(record.clone())).unwrap();
        let second = serde_json::to_string(&analyze(record)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_timestamps_fall_back_to_now() {
        let analysis = analyze(detail(serde_json::json!({
            "id": "q-1",
            "status": "completed",
            "items": []
        })));

        assert!(!analysis.created_at.is_empty());
        assert!(!analysis.updated_at.is_empty());
        assert!(analysis.processed_at.is_some());
    }

    #[test]
    fn stats_over_an_analysis() {
        let analysis = analyze(detail(serde_json::json!({
            "id": "q-1",
            "status": "completed",
            "total": 100,
            "items": [
                {
                    "id": "i-1",
                    "partNumber": "PN-1",
                    "description": "Bolt",
                    "totalPrice": 60,
                    "matches": [{ "id": "m-1", "priceDifference": -15 }]
                },
                {
                    "id": "i-2",
                    "partNumber": "PN-2",
                    "description": "Nut",
                    "totalPrice": 40,
                    "matches": []
                }
            ]
        })));

        let stats = QuoteStats::for_analysis(&analysis);
        assert_eq!(stats.total_items, 2);
        assert_eq!(stats.matched_items, 1);
        assert_eq!(stats.match_rate, 50.0);
        assert_eq!(stats.potential_savings, 15.0);
        assert_eq!(stats.affiliate_opportunities, 0);
    }
}
