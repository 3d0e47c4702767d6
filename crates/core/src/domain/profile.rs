use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub name: Option<String>,
    pub company: Option<String>,
    pub erp_vendor: Option<String>,
    pub acquirer: Option<String>,
    pub last_issue: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            name: None,
            company: None,
            erp_vendor: None,
            acquirer: None,
            last_issue: None,
            created_at: Utc::now(),
        }
    }

    /// Applies a patch with the same semantics the stores use: extracted
    /// attributes only fill empty fields, `last_issue` always replaces.
    pub fn merge(&mut self, patch: &ProfilePatch) {
        fill(&mut self.name, &patch.name);
        fill(&mut self.company, &patch.company);
        fill(&mut self.erp_vendor, &patch.erp_vendor);
        fill(&mut self.acquirer, &patch.acquirer);
        if let Some(issue) = &patch.last_issue {
            self.last_issue = Some(issue.clone());
        }
    }
}

fn fill(slot: &mut Option<String>, value: &Option<String>) {
    if slot.is_none() {
        if let Some(value) = value {
            *slot = Some(value.clone());
        }
    }
}

/// Partial profile update. `None` leaves the stored column untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub company: Option<String>,
    pub erp_vendor: Option<String>,
    pub acquirer: Option<String>,
    pub last_issue: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.company.is_none()
            && self.erp_vendor.is_none()
            && self.acquirer.is_none()
            && self.last_issue.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::{ProfilePatch, UserProfile};
    use crate::domain::conversation::UserId;

    #[test]
    fn merge_never_overwrites_extracted_fields() {
        let mut profile = UserProfile::new(UserId("u-1".to_string()));
        profile.name = Some("Ana".to_string());

        profile.merge(&ProfilePatch {
            name: Some("Bruno".to_string()),
            company: Some("Netunna".to_string()),
            ..ProfilePatch::default()
        });

        assert_eq!(profile.name.as_deref(), Some("Ana"));
        assert_eq!(profile.company.as_deref(), Some("Netunna"));
    }

    #[test]
    fn merge_replaces_last_issue() {
        let mut profile = UserProfile::new(UserId("u-1".to_string()));
        profile.last_issue = Some("chargeback".to_string());

        profile.merge(&ProfilePatch {
            last_issue: Some("erp_integration".to_string()),
            ..ProfilePatch::default()
        });

        assert_eq!(profile.last_issue.as_deref(), Some("erp_integration"));
        assert!(ProfilePatch::default().is_empty());
    }
}
