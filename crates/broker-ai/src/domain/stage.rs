use std::fmt;

use serde::{Deserialize, Serialize};

use super::user::UserRole;

/// Funnel position of a seller, tracked on the seller's property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SellerStage {
    Registration,
    Publishing,
    Visits,
    Completed,
}

impl SellerStage {
    pub const ALL: [SellerStage; 4] = [
        SellerStage::Registration,
        SellerStage::Publishing,
        SellerStage::Visits,
        SellerStage::Completed,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SellerStage::Registration => "registration",
            SellerStage::Publishing => "publishing",
            SellerStage::Visits => "visits",
            SellerStage::Completed => "completed",
        }
    }

    /// Accepts canonical labels plus the short aliases stored by earlier tooling.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "registration" | "regist" => Some(SellerStage::Registration),
            "publishing" | "publish" => Some(SellerStage::Publishing),
            "visits" | "visit" => Some(SellerStage::Visits),
            "completed" | "complete" => Some(SellerStage::Completed),
            _ => None,
        }
    }
}

/// Funnel position of a buyer, tracked on the buyer's chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyerStage {
    Contact,
    Qualification,
    Scheduling,
    FollowUp,
}

impl BuyerStage {
    pub const ALL: [BuyerStage; 4] = [
        BuyerStage::Contact,
        BuyerStage::Qualification,
        BuyerStage::Scheduling,
        BuyerStage::FollowUp,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            BuyerStage::Contact => "contact",
            BuyerStage::Qualification => "qualification",
            BuyerStage::Scheduling => "scheduling",
            BuyerStage::FollowUp => "follow_up",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "contact" => Some(BuyerStage::Contact),
            "qualification" => Some(BuyerStage::Qualification),
            "scheduling" | "schedule" => Some(BuyerStage::Scheduling),
            "follow_up" | "follow-up" | "followup" => Some(BuyerStage::FollowUp),
            _ => None,
        }
    }
}

/// A stage tagged with the role whose funnel it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "stage", rename_all = "snake_case")]
pub enum BusinessStage {
    Seller(SellerStage),
    Buyer(BuyerStage),
}

impl BusinessStage {
    pub fn initial(role: UserRole) -> Self {
        match role {
            UserRole::Seller => BusinessStage::Seller(SellerStage::Registration),
            UserRole::Buyer => BusinessStage::Buyer(BuyerStage::Contact),
        }
    }

    pub fn role(&self) -> UserRole {
        match self {
            BusinessStage::Seller(_) => UserRole::Seller,
            BusinessStage::Buyer(_) => UserRole::Buyer,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BusinessStage::Seller(stage) => stage.label(),
            BusinessStage::Buyer(stage) => stage.label(),
        }
    }

    pub fn parse_for(role: UserRole, raw: &str) -> Option<Self> {
        match role {
            UserRole::Seller => SellerStage::parse(raw).map(BusinessStage::Seller),
            UserRole::Buyer => BuyerStage::parse(raw).map(BusinessStage::Buyer),
        }
    }

    /// Every stage of both funnels, in funnel order.
    pub fn all() -> impl Iterator<Item = BusinessStage> {
        SellerStage::ALL
            .into_iter()
            .map(BusinessStage::Seller)
            .chain(BuyerStage::ALL.into_iter().map(BusinessStage::Buyer))
    }
}

impl fmt::Display for BusinessStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role().label(), self.label())
    }
}
