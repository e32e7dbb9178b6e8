// Supplier availability XML: room candidates from the AvailRQ request and
// bookable options from the AvailRS response, turned into a Catalog.

use crate::catalog::{
    Catalog, CatalogError, Price, RateId, RateOption, Recommendation, RecommendationId, Room,
    RoomId,
};
use crate::xml_response::{XmlAvailResponse, XmlHotel, XmlOption};
use quick_xml::de::from_str;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

// Error types for XML processing
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("XML parse error: {0}")]
    XmlParseError(String),

    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

// Paxes at or above this age count as adults
pub const ADULT_AGE: u32 = 18;

const RECOMMENDATION_PARAMETER: &str = "recommendation_id";
const SEARCH_TOKEN_PARAMETER: &str = "search_token";

#[derive(Debug, Default)]
pub struct AvailabilityProcessor;

impl AvailabilityProcessor {
    pub fn new() -> Self {
        Self
    }

    // Requested occupancy units from an AvailRQ document
    pub fn parse_room_candidates(&self, request_xml: &str) -> Result<Vec<Room>, ProcessingError> {
        let mut rooms: Vec<Room> = Vec::new();
        let mut in_candidate = false;

        let mut reader = Reader::from_str(request_xml);
        reader.config_mut().trim_text(true);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) if e.name().as_ref() == b"RoomCandidate" => {
                    let id = attribute(&e, "id")?.ok_or_else(|| {
                        ProcessingError::MissingRequiredField("RoomCandidate@id".to_string())
                    })?;
                    rooms.push(Room::new(RoomId::new(id), 0, Vec::new()));
                    in_candidate = true;
                }
                Ok(Event::Empty(e)) if e.name().as_ref() == b"RoomCandidate" => {
                    let id = attribute(&e, "id")?.unwrap_or_default();
                    return Err(ProcessingError::MissingRequiredField(format!(
                        "Pax in RoomCandidate {}",
                        id
                    )));
                }
                Ok(Event::End(e)) if e.name().as_ref() == b"RoomCandidate" => {
                    if let Some(room) = rooms
                        .last()
                        .filter(|room| room.adults == 0 && room.child_ages.is_empty())
                    {
                        return Err(ProcessingError::MissingRequiredField(format!(
                            "Pax in RoomCandidate {}",
                            room.room_id
                        )));
                    }
                    in_candidate = false;
                }
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"Pax" => {
                    let room = rooms
                        .last_mut()
                        .filter(|_| in_candidate)
                        .ok_or_else(|| {
                            ProcessingError::InvalidFormat(
                                "Pax outside of a RoomCandidate".to_string(),
                            )
                        })?;
                    let age = attribute(&e, "age")?
                        .ok_or_else(|| ProcessingError::MissingRequiredField("Pax@age".to_string()))?;
                    let age: u32 = age.parse().map_err(|_| {
                        ProcessingError::InvalidFormat(format!("Pax age '{}' is not a number", age))
                    })?;
                    if age >= ADULT_AGE {
                        room.adults += 1;
                    } else {
                        room.child_ages.push(age);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(ProcessingError::XmlParseError(format!(
                        "Error at position {}: {:?}",
                        reader.error_position(),
                        e
                    )))
                }
                _ => (),
            }
        }

        if rooms.is_empty() {
            return Err(ProcessingError::MissingRequiredField(
                "RoomCandidate".to_string(),
            ));
        }
        Ok(rooms)
    }

    // Every available option of the hotel becomes a recommendation. Its rooms
    // are the rates, matched to `rooms` by room candidate id.
    pub fn catalog_for_hotel(
        &self,
        response_xml: &str,
        hotel_code: &str,
        rooms: Vec<Room>,
    ) -> Result<Catalog, ProcessingError> {
        let response: XmlAvailResponse =
            from_str(response_xml).map_err(|e| ProcessingError::XmlParseError(e.to_string()))?;

        let hotel = response
            .hotels
            .hotels
            .into_iter()
            .find(|hotel| hotel.hotel_id == hotel_code)
            .ok_or_else(|| ProcessingError::MissingRequiredField(format!("Hotel {}", hotel_code)))?;

        let room_index: HashMap<&str, usize> = rooms
            .iter()
            .enumerate()
            .map(|(index, room)| (room.room_id.as_str(), index))
            .collect();

        let mut rates: Vec<Vec<RateOption>> = vec![Vec::new(); rooms.len()];
        let mut recommendations = Vec::new();

        for (board_basis, option) in available_options(&hotel) {
            let recommendation_id = option
                .parameter(RECOMMENDATION_PARAMETER)
                .or_else(|| option.parameter(SEARCH_TOKEN_PARAMETER))
                .ok_or_else(|| {
                    ProcessingError::MissingRequiredField(format!(
                        "Parameter {} on option of hotel {}",
                        RECOMMENDATION_PARAMETER, hotel_code
                    ))
                })?;

            let mut vector: Vec<Option<RateId>> = vec![None; rooms.len()];
            for xml_room in &option.rooms.rooms {
                let index = *room_index
                    .get(xml_room.room_candidate_ref_id.as_str())
                    .ok_or_else(|| {
                        ProcessingError::InvalidFormat(format!(
                            "Option {} references unknown room candidate {}",
                            recommendation_id, xml_room.room_candidate_ref_id
                        ))
                    })?;
                let slot = vector.get_mut(index).filter(|slot| slot.is_none()).ok_or_else(|| {
                    ProcessingError::InvalidFormat(format!(
                        "Option {} books room candidate {} twice",
                        recommendation_id, xml_room.room_candidate_ref_id
                    ))
                })?;

                let rate_id = RateId::new(xml_room.id.clone());
                *slot = Some(rate_id.clone());

                let price = Price::new(
                    parse_amount(&xml_room.price.amount)?,
                    xml_room.price.currency.clone(),
                );
                // A rate offered by several options keeps the first option's price and board
                if let Some(candidates) = rates.get_mut(index) {
                    match candidates.iter().find(|option| option.rate_id == rate_id) {
                        Some(listed) if listed.price != price => {
                            debug!(
                                rate = %rate_id,
                                kept = listed.price.amount,
                                dropped = price.amount,
                                "rate priced differently across options"
                            );
                        }
                        Some(_) => (),
                        None => candidates.push(RateOption {
                            rate_id,
                            recommendation_ids: Vec::new(),
                            price,
                            board_basis: board_basis.to_string(),
                            refundable: !xml_room.non_refundable.eq_ignore_ascii_case("true"),
                        }),
                    }
                }
            }

            let vector = vector
                .into_iter()
                .enumerate()
                .map(|(index, rate)| {
                    rate.ok_or_else(|| {
                        ProcessingError::InvalidFormat(format!(
                            "Option {} does not cover room {}",
                            recommendation_id, index
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            recommendations.push(Recommendation {
                recommendation_id: RecommendationId::new(recommendation_id),
                rates: vector,
                total_price: Price::new(
                    parse_amount(&option.price.amount)?,
                    option.price.currency.clone(),
                ),
            });
        }

        debug!(
            hotel = hotel_code,
            recommendations = recommendations.len(),
            "built catalog from availability response"
        );
        Ok(Catalog::new(rooms, rates, recommendations)?)
    }
}

// Options that can be booked right away, with their meal plan code
fn available_options(hotel: &XmlHotel) -> impl Iterator<Item = (&str, &XmlOption)> {
    hotel.meal_plans.meal_plans.iter().flat_map(|meal_plan| {
        meal_plan.options.options.iter().filter_map(move |option| {
            if option.status.is_empty() || option.status == "OK" {
                Some((meal_plan.code.as_str(), option))
            } else {
                warn!(status = %option.status, "skipping option that is not immediately bookable");
                None
            }
        })
    })
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>, ProcessingError> {
    let attribute = element
        .try_get_attribute(name)
        .map_err(|e| ProcessingError::XmlParseError(e.to_string()))?;
    attribute
        .map(|attribute| {
            std::str::from_utf8(&attribute.value)
                .map(str::to_string)
                .map_err(|e| ProcessingError::InvalidFormat(e.to_string()))
        })
        .transpose()
}

fn parse_amount(amount: &str) -> Result<f64, ProcessingError> {
    amount
        .parse()
        .map_err(|_| ProcessingError::InvalidFormat(format!("'{}' is not an amount", amount)))
}

// A small sample for inline testing
#[cfg(test)]
pub(crate) const SAMPLE_REQUEST_XML: &str = r#"
<AvailRQ>
  <Currency>GBP</Currency>
  <Nationality>US</Nationality>
  <StartDate>11/06/2025</StartDate>
  <EndDate>12/06/2025</EndDate>
  <RoomCandidates>
    <RoomCandidate id="1">
      <Paxes>
        <Pax age="30" id="1"/>
        <Pax age="28" id="2"/>
      </Paxes>
    </RoomCandidate>
    <RoomCandidate id="2">
      <Paxes>
        <Pax age="40" id="1"/>
        <Pax age="7" id="2"/>
      </Paxes>
    </RoomCandidate>
  </RoomCandidates>
</AvailRQ>
"#;

#[cfg(test)]
pub(crate) const SAMPLE_RESPONSE_XML: &str = r#"
<AvailRS>
  <Hotels>
    <Hotel code="39776757" name="Days Inn By Wyndham Fargo">
      <MealPlans>
        <MealPlan code="RO">
          <Options>
            <Option type="Hotel" paymentType="MerchantPay" status="OK">
              <Price currency="GBP" amount="169.64" binding="false" commission="-1" minimumSellingPrice="-1"/>
              <Rooms>
                <Room id="1#ND1" roomCandidateRefId="1" code="ND1" description="ROOM, QUEEN BED" numberOfUnits="1" nonRefundable="false">
                  <Price currency="GBP" amount="84.82" binding="false" commission="-1" minimumSellingPrice="-1"/>
                </Room>
                <Room id="2#ND1" roomCandidateRefId="2" code="ND1" description="ROOM, QUEEN BED" numberOfUnits="1" nonRefundable="false">
                  <Price currency="GBP" amount="84.82" binding="false" commission="-1" minimumSellingPrice="-1"/>
                </Room>
              </Rooms>
              <Parameters>
                <Parameter key="search_token" value="39776757|2025-06-11|2025-06-12|RO|1"/>
              </Parameters>
            </Option>
            <Option type="Hotel" paymentType="MerchantPay" status="OK">
              <Price currency="GBP" amount="179.64" binding="false" commission="-1" minimumSellingPrice="-1"/>
              <Rooms>
                <Room id="1#ND1" roomCandidateRefId="1" code="ND1" description="ROOM, QUEEN BED" numberOfUnits="1" nonRefundable="false">
                  <Price currency="GBP" amount="84.82" binding="false" commission="-1" minimumSellingPrice="-1"/>
                </Room>
                <Room id="2#NK1" roomCandidateRefId="2" code="NK1" description="ROOM, KING BED" numberOfUnits="1" nonRefundable="true">
                  <Price currency="GBP" amount="94.82" binding="false" commission="-1" minimumSellingPrice="-1"/>
                </Room>
              </Rooms>
              <Parameters>
                <Parameter key="search_token" value="39776757|2025-06-11|2025-06-12|RO|2"/>
                <Parameter key="recommendation_id" value="REC-RO-2"/>
              </Parameters>
            </Option>
            <Option type="Hotel" paymentType="MerchantPay" status="RQ">
              <Price currency="GBP" amount="150.00" binding="false" commission="-1" minimumSellingPrice="-1"/>
              <Rooms>
                <Room id="1#OR1" roomCandidateRefId="1" code="OR1" description="ON REQUEST" numberOfUnits="1" nonRefundable="false">
                  <Price currency="GBP" amount="75.00" binding="false" commission="-1" minimumSellingPrice="-1"/>
                </Room>
                <Room id="2#OR1" roomCandidateRefId="2" code="OR1" description="ON REQUEST" numberOfUnits="1" nonRefundable="false">
                  <Price currency="GBP" amount="75.00" binding="false" commission="-1" minimumSellingPrice="-1"/>
                </Room>
              </Rooms>
              <Parameters>
                <Parameter key="search_token" value="39776757|2025-06-11|2025-06-12|RO|3"/>
              </Parameters>
            </Option>
          </Options>
        </MealPlan>
        <MealPlan code="BB">
          <Options>
            <Option type="Hotel" paymentType="MerchantPay" status="OK">
              <Price currency="GBP" amount="199.64" binding="false" commission="-1" minimumSellingPrice="-1"/>
              <Rooms>
                <Room id="1#BB1" roomCandidateRefId="1" code="BB1" description="ROOM, QUEEN BED, BREAKFAST" numberOfUnits="1" nonRefundable="false">
                  <Price currency="GBP" amount="99.82" binding="false" commission="-1" minimumSellingPrice="-1"/>
                </Room>
                <Room id="2#ND1" roomCandidateRefId="2" code="ND1" description="ROOM, QUEEN BED" numberOfUnits="1" nonRefundable="false">
                  <Price currency="GBP" amount="99.82" binding="false" commission="-1" minimumSellingPrice="-1"/>
                </Room>
              </Rooms>
              <Parameters>
                <Parameter key="search_token" value="39776757|2025-06-11|2025-06-12|BB|1"/>
              </Parameters>
            </Option>
          </Options>
        </MealPlan>
      </MealPlans>
    </Hotel>
  </Hotels>
</AvailRS>
"#;
