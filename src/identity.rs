//! Developer identity used to build certificate subjects.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeveloperIdentity {
    pub name: String,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub identity_url: Option<String>,
    #[serde(default)]
    pub alias_urls: Vec<String>,
}

impl DeveloperIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    #[must_use]
    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    #[must_use]
    pub fn with_country_code(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = Some(country_code.into());
        self
    }

    #[must_use]
    pub fn with_identity_url(mut self, url: impl Into<String>) -> Self {
        self.identity_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_alias_url(mut self, url: impl Into<String>) -> Self {
        self.alias_urls.push(url.into());
        self
    }

    /// X.500 subject in the form `CN=<name>[,O=<org>][,L=<city>][,C=<country>]`.
    pub fn x500_subject(&self) -> String {
        let mut subject = format!("CN={}", self.name);
        if let Some(organization) = &self.organization {
            subject.push_str(",O=");
            subject.push_str(organization);
        }
        if let Some(city) = &self.city {
            subject.push_str(",L=");
            subject.push_str(city);
        }
        if let Some(country) = &self.country_code {
            subject.push_str(",C=");
            subject.push_str(country);
        }
        subject
    }

    /// Keystore aliases this identity may be stored under, primary URL first.
    pub fn candidate_aliases(&self) -> Vec<&str> {
        self.identity_url
            .iter()
            .chain(self.alias_urls.iter())
            .map(String::as_str)
            .collect()
    }
}
