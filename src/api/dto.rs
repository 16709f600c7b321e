//! Profile gifts API DTOs
//!
//! Wire shapes for `/profile-gifts`. Shared with the client side, which
//! deserializes the same body.

use serde::{Deserialize, Serialize};

use crate::data::{DecorationColors, GiftRecord, ProfileInfo, Timestamp};
use crate::service::ProfileGifts;

/// Query parameters for `GET /profile-gifts`
#[derive(Debug, Default, Deserialize)]
pub struct ProfileGiftsQuery {
    pub username: Option<String>,
}

/// Successful `/profile-gifts` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileGiftsResponse {
    pub success: bool,
    pub gifts: Vec<GiftRecord>,
    pub profile: ProfileInfo,
    pub total: u64,
    pub nft_count: u64,
    pub total_value: f64,
    pub decoration_colors: Option<DecorationColors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoration: Option<serde_json::Value>,
    pub fetched_at: Timestamp,
    pub cached: bool,
    pub updated_at: Timestamp,
    pub refreshing: bool,
}

impl From<ProfileGifts> for ProfileGiftsResponse {
    fn from(gifts: ProfileGifts) -> Self {
        let payload = gifts.payload;
        Self {
            success: true,
            gifts: payload.gifts,
            profile: payload.profile,
            total: payload.total,
            nft_count: payload.nft_count,
            total_value: payload.total_value,
            decoration_colors: payload.decoration_colors,
            decoration: gifts.decoration,
            fetched_at: payload.fetched_at,
            cached: gifts.cached,
            updated_at: gifts.updated_at,
            refreshing: gifts.refreshing,
        }
    }
}

/// Failure body, as produced by `AppError`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ProfilePayload;

    #[test]
    fn response_uses_camel_case_and_null_colors() {
        let gifts = ProfileGifts {
            payload: ProfilePayload {
                gifts: vec![],
                profile: ProfileInfo {
                    id: Some(1),
                    username: "alice".to_string(),
                    display_name: "Alice".to_string(),
                    photo_data_url: None,
                    decoration_colors: None,
                },
                total: 0,
                nft_count: 0,
                total_value: 0.0,
                decoration_colors: None,
                fetched_at: 10,
            },
            decoration: None,
            cached: true,
            updated_at: 20,
            refreshing: true,
        };

        let body = serde_json::to_value(ProfileGiftsResponse::from(gifts)).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["nftCount"], 0);
        assert_eq!(body["totalValue"], 0.0);
        assert_eq!(body["updatedAt"], 20);
        assert_eq!(body["profile"]["displayName"], "Alice");
        assert!(body["decorationColors"].is_null());
        assert!(body.get("decoration").is_none());
    }
}
