use crate::models::{Lead, LeadStats};

/// Counts total leads and how many carry a phone number or a website.
pub fn summarize(leads: &[Lead]) -> LeadStats {
    leads.iter().fold(
        LeadStats {
            total: leads.len(),
            ..LeadStats::default()
        },
        |mut stats, lead| {
            if lead.has_phone() {
                stats.with_phone += 1;
            }
            if lead.has_website() {
                stats.with_website += 1;
            }
            stats
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(name: &str, phone: Option<&str>, website: Option<&str>) -> Lead {
        Lead {
            name: name.to_string(),
            phone: phone.map(str::to_string),
            website: website.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_collection() {
        assert_eq!(summarize(&[]), LeadStats::default());
    }

    #[test]
    fn test_counts_presence() {
        let leads = vec![
            lead("A", Some("555-1111"), None),
            lead("B", Some("555-2222"), Some("b.com")),
            lead("C", None, Some("c.com")),
            lead("D", Some(""), None),
        ];

        assert_eq!(
            summarize(&leads),
            LeadStats {
                total: 4,
                with_phone: 2,
                with_website: 2,
            }
        );
    }
}
