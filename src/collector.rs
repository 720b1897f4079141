//! Lead collection: turns the Fetcher's raw listing stream into a bounded,
//! deduplicated result collection.
//!
//! Identity is [`Lead::identity_key`]. The first listing seen for a key wins,
//! later duplicates are dropped without error. Listings without a name are
//! scraping noise and are dropped the same way.
use crate::errors::AppError;
use crate::models::{Lead, RawListing};
use futures::{Stream, StreamExt};
use std::collections::HashSet;

/// What happened to a listing offered to the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Accepted,
    Duplicate,
    /// No usable name.
    Rejected,
    /// The bound was already reached; the listing was not looked at.
    Full,
}

/// Append-only accumulator enforcing uniqueness and the result bound.
#[derive(Debug)]
pub struct LeadCollector {
    max_results: usize,
    seen: HashSet<(String, String)>,
    leads: Vec<Lead>,
}

impl LeadCollector {
    pub fn new(max_results: usize) -> Self {
        Self {
            max_results,
            seen: HashSet::new(),
            leads: Vec::with_capacity(max_results.min(64)),
        }
    }

    pub fn offer(&mut self, raw: RawListing) -> Offer {
        if self.is_full() {
            return Offer::Full;
        }

        let Some(lead) = Lead::from_raw(raw) else {
            return Offer::Rejected;
        };

        if !self.seen.insert(lead.identity_key()) {
            tracing::debug!("Dropping duplicate listing: {}", lead.name);
            return Offer::Duplicate;
        }

        self.leads.push(lead);
        Offer::Accepted
    }

    pub fn is_full(&self) -> bool {
        self.leads.len() >= self.max_results
    }

    pub fn len(&self) -> usize {
        self.leads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leads.is_empty()
    }

    pub fn into_leads(self) -> Vec<Lead> {
        self.leads
    }
}

/// Drains `listings` into a deduplicated collection of at most `max_results`
/// leads, in the order they were produced.
///
/// The stream is not polled again once the bound is reached. An error from the
/// stream before that point aborts collection and nothing collected so far is
/// returned.
pub async fn collect<S>(listings: S, max_results: usize) -> Result<Vec<Lead>, AppError>
where
    S: Stream<Item = Result<RawListing, AppError>>,
{
    let mut collector = LeadCollector::new(max_results);
    let mut rejected = 0usize;
    let mut duplicates = 0usize;

    futures::pin_mut!(listings);

    while !collector.is_full() {
        let Some(item) = listings.next().await else {
            break;
        };

        match collector.offer(item?) {
            Offer::Accepted | Offer::Full => {}
            Offer::Duplicate => duplicates += 1,
            Offer::Rejected => rejected += 1,
        }
    }

    if collector.is_empty() && duplicates + rejected > 0 {
        tracing::warn!(
            "No usable leads: {} duplicates, {} without name",
            duplicates,
            rejected
        );
    } else {
        tracing::debug!(
            "Collected {} leads ({} duplicates, {} without name)",
            collector.len(),
            duplicates,
            rejected
        );
    }

    Ok(collector.into_leads())
}
