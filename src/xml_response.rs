use serde::{Deserialize, Serialize};

// Structures for supplier AvailRS deserialization
#[derive(Debug, PartialEq, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "PascalCase")]
#[serde(rename = "AvailRS")]
pub struct XmlAvailResponse {
    pub hotels: XmlHotels,
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct XmlHotels {
    #[serde(rename = "Hotel")]
    pub hotels: Vec<XmlHotel>,
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct XmlHotel {
    #[serde(rename = "@code")]
    pub hotel_id: String,
    #[serde(rename = "@name")]
    pub hotel_name: String,
    pub meal_plans: XmlMealPlans,
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct XmlMealPlans {
    #[serde(rename = "MealPlan")]
    pub meal_plans: Vec<XmlMealPlan>,
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct XmlMealPlan {
    #[serde(rename = "@code")]
    pub code: String,
    pub options: XmlOptions,
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct XmlOptions {
    #[serde(rename = "Option")]
    pub options: Vec<XmlOption>,
}

// One Option is one bookable bundle covering every room candidate
#[derive(Debug, PartialEq, Default, Deserialize, Clone, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct XmlOption {
    #[serde(rename = "@status")]
    pub status: String,
    pub price: XmlPrice,
    pub rooms: XmlRooms,
    pub parameters: XmlParameters,
}

impl XmlOption {
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .parameters
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct XmlPrice {
    #[serde(rename = "@currency")]
    pub currency: String,
    #[serde(rename = "@amount")]
    pub amount: String,
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct XmlRooms {
    #[serde(rename = "Room")]
    pub rooms: Vec<XmlRoom>,
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct XmlRoom {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@roomCandidateRefId")]
    pub room_candidate_ref_id: String,
    #[serde(rename = "@code")]
    pub code: String,
    #[serde(rename = "@description")]
    pub description: String,
    #[serde(rename = "@nonRefundable")]
    pub non_refundable: String,
    pub price: XmlPrice,
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct XmlParameters {
    #[serde(rename = "Parameter")]
    pub parameters: Vec<XmlParameter>,
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct XmlParameter {
    #[serde(rename = "@key")]
    pub key: String,
    #[serde(rename = "@value")]
    pub value: String,
}
