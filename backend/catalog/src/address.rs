use serde::{Deserialize, Serialize};

const SEPARATOR: &str = ", ";

/// Shipping address as entered at checkout or on the account page.
///
/// Region, province, city and barangay hold whatever codes or names the client
/// submits; they are stored verbatim.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    #[serde(default)]
    pub address_details: String,
    #[serde(default)]
    pub barangay: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub region: String,
}

impl Address {
    /// Joins the parts from most to least specific.
    pub fn compose(&self) -> String {
        [
            self.address_details.trim(),
            self.barangay.trim(),
            self.city.trim(),
            self.province.trim(),
            self.region.trim(),
        ]
        .join(SEPARATOR)
    }

    /// Splits a composed address back into its five parts.
    ///
    /// Missing trailing parts come back empty; anything past the fifth comma is
    /// folded into the region.
    pub fn parse(composed: &str) -> Self {
        let mut parts = composed.splitn(5, ',').map(|part| part.trim().to_string());
        let mut next = || parts.next().unwrap_or_default();

        Self {
            address_details: next(),
            barangay: next(),
            city: next(),
            province: next(),
            region: next(),
        }
    }

    pub fn is_empty(&self) -> bool {
        [
            &self.address_details,
            &self.barangay,
            &self.city,
            &self.province,
            &self.region,
        ]
        .iter()
        .all(|part| part.trim().is_empty())
    }
}
